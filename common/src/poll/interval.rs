// Shared tick interval computation

/// Greatest common divisor by the Euclidean algorithm
pub fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        let r = a % b;
        a = b;
        b = r;
    }
    a
}

/// Compute the shared tick interval for a set of poller intervals.
///
/// Zero intervals are ignored. Returns `None` when nothing remains or the
/// resulting GCD is zero, meaning no timer should run.
pub fn tick_interval<I>(intervals: I) -> Option<u64>
where
    I: IntoIterator<Item = u64>,
{
    let result = intervals
        .into_iter()
        .filter(|ms| *ms > 0)
        .fold(0, gcd);

    (result > 0).then_some(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gcd_basic() {
        assert_eq!(gcd(200, 500), 100);
        assert_eq!(gcd(500, 200), 100);
        assert_eq!(gcd(7, 13), 1);
        assert_eq!(gcd(0, 40), 40);
        assert_eq!(gcd(40, 0), 40);
    }

    #[test]
    fn test_tick_interval_two_pollers() {
        assert_eq!(tick_interval([200, 500]), Some(100));
    }

    #[test]
    fn test_tick_interval_three_pollers() {
        assert_eq!(tick_interval([50, 20, 200]), Some(10));
    }

    #[test]
    fn test_tick_interval_single_poller() {
        assert_eq!(tick_interval([300]), Some(300));
    }

    #[test]
    fn test_tick_interval_empty_is_none() {
        assert_eq!(tick_interval(std::iter::empty()), None);
    }

    #[test]
    fn test_tick_interval_ignores_zero() {
        assert_eq!(tick_interval([0, 150, 0, 100]), Some(50));
        assert_eq!(tick_interval([0, 0]), None);
    }
}
