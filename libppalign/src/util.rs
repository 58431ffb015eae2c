#[cfg(test)]
#[ctor::ctor]
fn init_backtrace() {
    color_backtrace::install();
}

pub trait VecUtils<T>
where
    T: Clone,
{
    fn reset(&mut self, value: T);
}

impl<T> VecUtils<T> for Vec<T>
where
    T: Clone,
{
    fn reset(&mut self, value: T) {
        self.iter_mut().for_each(|v| *v = value.clone());
    }
}

/// Greatest common divisor of two non-negative lattice scores.
pub fn gcd(a: i64, b: i64) -> i64 {
    let (mut a, mut b) = (a.abs(), b.abs());
    while b != 0 {
        let t = b;
        b = a % b;
        a = t;
    }
    a
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gcd() {
        assert_eq!(gcd(12, 18), 6);
        assert_eq!(gcd(18, 12), 6);
        assert_eq!(gcd(7, 13), 1);
        assert_eq!(gcd(0, 5), 5);
        assert_eq!(gcd(-4, 6), 2);
    }

    #[test]
    fn test_vec_reset() {
        let mut v = vec![1.0, 2.0, 3.0];
        v.reset(0.0);
        assert_eq!(v, vec![0.0, 0.0, 0.0]);
    }
}
