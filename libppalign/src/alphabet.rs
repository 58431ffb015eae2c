use phf::phf_map;

pub const UTF8_SPACE: u8 = 32;
pub const UTF8_STAR: u8 = 42;
pub const UTF8_PLUS: u8 = 43;
pub const UTF8_DASH: u8 = 45;

/// Number of scored residue codes.
pub const NUM_RESIDUES: usize = 20;
/// Alphabet size including the gap/unknown code.
pub const ALPHABET_SIZE: usize = 21;
/// Digital code for the gap/unknown symbol.
pub const GAP_CODE: u8 = 20;

/// maps from \<digital code\> -> \<UTF8 residue character\>
pub const AMINO_ALPHABET: [u8; ALPHABET_SIZE] = [
    65, 82, 78, 68, 67, 81, 69, 71, 72, 73, 76, 75, 77, 70, 80, 83, 84, 87, 89, 86, UTF8_DASH,
];

pub const UTF8_TO_DIGITAL_AMINO: phf::Map<u8, u8> = phf_map! {
    // upper case
    65u8 => 0,    // A
    82u8 => 1,    // R
    78u8 => 2,    // N
    68u8 => 3,    // D
    67u8 => 4,    // C
    81u8 => 5,    // Q
    69u8 => 6,    // E
    71u8 => 7,    // G
    72u8 => 8,    // H
    73u8 => 9,    // I
    76u8 => 10,   // L
    75u8 => 11,   // K
    77u8 => 12,   // M
    70u8 => 13,   // F
    80u8 => 14,   // P
    83u8 => 15,   // S
    84u8 => 16,   // T
    87u8 => 17,   // W
    89u8 => 18,   // Y
    86u8 => 19,   // V
    // lower case
    97u8 => 0,    // a
    114u8 => 1,   // r
    110u8 => 2,   // n
    100u8 => 3,   // d
    99u8 => 4,    // c
    113u8 => 5,   // q
    101u8 => 6,   // e
    103u8 => 7,   // g
    104u8 => 8,   // h
    105u8 => 9,   // i
    108u8 => 10,  // l
    107u8 => 11,  // k
    109u8 => 12,  // m
    102u8 => 13,  // f
    112u8 => 14,  // p
    115u8 => 15,  // s
    116u8 => 16,  // t
    119u8 => 17,  // w
    121u8 => 18,  // y
    118u8 => 19,  // v
    // gap / unknown
    45u8 => 20,   // -
    88u8 => 20,   // X
    120u8 => 20,  // x
};

/// Robinson & Robinson amino acid background probabilities,
/// in digital code order.
pub const AMINO_BACKGROUND_FREQUENCIES: [f64; NUM_RESIDUES] = [
    0.07805, // A
    0.05129, // R
    0.04487, // N
    0.05364, // D
    0.01925, // C
    0.04264, // Q
    0.06295, // E
    0.07377, // G
    0.02199, // H
    0.05142, // I
    0.09019, // L
    0.05744, // K
    0.02243, // M
    0.03856, // F
    0.05203, // P
    0.07120, // S
    0.05841, // T
    0.01330, // W
    0.03216, // Y
    0.06441, // V
];

pub fn digital_to_utf8(code: u8) -> u8 {
    AMINO_ALPHABET
        .get(code as usize)
        .copied()
        .unwrap_or(UTF8_DASH)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_background_frequencies_sum_to_one() {
        let sum: f64 = AMINO_BACKGROUND_FREQUENCIES.iter().sum();
        assert!((sum - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_utf8_digital_maps_agree() {
        for (code, &utf8) in AMINO_ALPHABET.iter().enumerate().take(NUM_RESIDUES) {
            assert_eq!(UTF8_TO_DIGITAL_AMINO[&utf8], code as u8);
        }
        assert_eq!(UTF8_TO_DIGITAL_AMINO[&UTF8_DASH], GAP_CODE);
    }
}
