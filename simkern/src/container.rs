use std::collections::VecDeque;

/// A type-safe identifier of a container registered in a simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContainerId(pub(crate) usize);

/// Level-based store of a homogeneous quantity, e.g., raw material in a bin.
///
/// Gets that cannot be satisfied wait in a FIFO queue. The queue is strictly head-of-line:
/// a waiting get blocks every get behind it, even one that would fit in the current level.
/// The level is unbounded above, so puts always succeed.
///
/// # Examples
///
/// ```
/// # use simkern::Container;
/// let mut bin = Container::new(3);
/// assert!(!bin.get("big", 5));
/// assert!(!bin.get("small", 1)); // blocked by "big"
/// assert_eq!(bin.put(2), vec!["big"]);
/// assert_eq!(bin.level(), 0);
/// assert_eq!(bin.put(1), vec!["small"]);
/// ```
#[derive(Debug)]
pub struct Container<T> {
    level: u64,
    gets: VecDeque<(T, u64)>,
}

impl<T> Container<T> {
    /// Creates a container holding `level` units.
    #[must_use]
    pub fn new(level: u64) -> Self {
        Self {
            level,
            gets: VecDeque::new(),
        }
    }

    /// Takes `amount` out for `ticket`. Returns `true` if this happened right away;
    /// otherwise, the ticket waits in the queue.
    pub fn get(&mut self, ticket: T, amount: u64) -> bool {
        if self.gets.is_empty() && self.level >= amount {
            self.level -= amount;
            true
        } else {
            self.gets.push_back((ticket, amount));
            false
        }
    }

    /// Adds `amount` and returns the tickets whose gets have been satisfied, in queue order.
    pub fn put(&mut self, amount: u64) -> Vec<T> {
        self.level += amount;
        let mut satisfied = Vec::new();
        while let Some(&(_, requested)) = self.gets.front() {
            if requested > self.level {
                break;
            }
            self.level -= requested;
            if let Some((ticket, _)) = self.gets.pop_front() {
                satisfied.push(ticket);
            }
        }
        satisfied
    }

    /// Current level.
    #[must_use]
    pub fn level(&self) -> u64 {
        self.level
    }

    /// Number of gets waiting in the queue.
    #[must_use]
    pub fn waiting(&self) -> usize {
        self.gets.len()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use quickcheck_macros::quickcheck;

    #[test]
    fn test_immediate_get() {
        let mut bin = Container::new(25);
        assert!(bin.get(0, 1));
        assert!(bin.get(1, 24));
        assert_eq!(bin.level(), 0);
        assert!(!bin.get(2, 1));
        assert_eq!(bin.waiting(), 1);
    }

    #[test]
    fn test_put_grants_as_many_as_fit() {
        let mut bin = Container::new(0);
        assert!(!bin.get(0, 1));
        assert!(!bin.get(1, 2));
        assert!(!bin.get(2, 3));
        assert_eq!(bin.put(4), vec![0, 1]);
        assert_eq!(bin.level(), 1);
        assert_eq!(bin.put(2), vec![2]);
        assert_eq!(bin.level(), 0);
        assert_eq!(bin.waiting(), 0);
    }

    #[test]
    fn test_head_of_line_blocking() {
        let mut bin = Container::new(4);
        assert!(!bin.get("large", 10));
        assert!(!bin.get("small", 1));
        assert!(bin.put(1).is_empty());
        assert_eq!(bin.level(), 5);
        assert_eq!(bin.put(6), vec!["large", "small"]);
        assert_eq!(bin.level(), 0);
    }

    /// Replays random gets (`Some(amount)`) and puts (`None` puts a fixed amount), and checks
    /// that tickets are served strictly in request order.
    #[quickcheck]
    fn prop_served_in_order(initial: u8, ops: Vec<Option<u8>>) -> bool {
        let mut bin = Container::new(u64::from(initial));
        let mut next_ticket = 0_u32;
        let mut served = Vec::new();
        for op in ops {
            match op {
                Some(amount) => {
                    if bin.get(next_ticket, u64::from(amount)) {
                        served.push(next_ticket);
                    }
                    next_ticket += 1;
                }
                None => served.extend(bin.put(7)),
            }
        }
        served.windows(2).all(|w| w[0] < w[1])
    }
}
