use num_traits::One;
use num_traits::ops::checked::CheckedAdd;

/// Iterative generic fibonacci implementation, starting at 1, 2, 3, 5...
pub struct Fibonacci<T> {
    curr: Option<T>,
    next: Option<T>,
}

impl<T> Iterator for Fibonacci<T>
where
    T: CheckedAdd + Copy,
{
    type Item = T;

    fn next(&mut self) -> Option<T> {
        let next = self.curr?.checked_add(&self.next?);

        self.curr = self.next;
        self.next = next;

        self.curr
    }
}

/// Create a new Iterative fibonacci.
pub fn fibonacci_iterator<T>() -> Fibonacci<T>
where
    T: One + Copy,
{
    let init = T::one();
    Fibonacci {
        curr: Some(init),
        next: Some(init),
    }
}

/// Zeckendorf representation of `value`, least significant term first,
/// followed by the terminating 1 bit.
///
/// Zero has no representation.
pub fn zeckendorf_bits(value: u64) -> Option<Vec<bool>> {
    if value == 0 {
        return None;
    }

    let terms = fibonacci_iterator::<u64>()
        .take_while(|&f| f <= value)
        .collect::<Vec<_>>();
    let mut bits = vec![false; terms.len()];
    let mut rest = value;
    for (i, &f) in terms.iter().enumerate().rev() {
        if f <= rest {
            bits[i] = true;
            rest -= f;
        }
    }
    bits.push(true);

    Some(bits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn sequence_is_correct() {
        assert_eq!(
            fibonacci_iterator::<u16>().take(16).collect::<Vec<_>>(),
            vec![1, 2, 3, 5, 8, 13, 21, 34, 55, 89, 144, 233, 377, 610, 987, 1597]
        );
    }

    #[test]
    fn u8_overflow() {
        assert_eq!(
            fibonacci_iterator::<u8>().collect::<Vec<_>>(),
            vec![1, 2, 3, 5, 8, 13, 21, 34, 55, 89, 144, 233]
        );
    }

    #[test_case(0 => None)]
    #[test_case(1 => Some(vec![true, true]))]
    #[test_case(3 => Some(vec![false, false, true, true]))]
    #[test_case(6 => Some(vec![true, false, false, true, true]))]
    fn zeckendorf(value: u64) -> Option<Vec<bool>> {
        zeckendorf_bits(value)
    }

    #[test]
    fn zeckendorf_has_no_consecutive_terms() {
        for n in 1..500 {
            let bits = zeckendorf_bits(n).unwrap();
            let body = &bits[..bits.len() - 1];
            assert!(body.windows(2).all(|w| !(w[0] && w[1])), "{n}");
            assert_eq!(body.last(), Some(&true), "{n}");
        }
    }
}
