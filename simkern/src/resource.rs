use std::collections::VecDeque;

use crate::Signal;

/// A type-safe identifier of a resource registered in a simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceId(pub(crate) usize);

/// Identifies a single request made to a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestId(pub(crate) usize);

/// Lifecycle of a resource request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStatus {
    /// Waiting in the resource queue.
    Pending,
    /// Holds one unit of the resource's capacity.
    Granted,
    /// Either released after being granted, or withdrawn while still pending.
    Released,
}

/// A request token returned to the process that asked for a resource.
///
/// The token is granted once its [`signal`](Self::signal) triggers. A granted token occupies
/// a unit of capacity until it is explicitly released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Request {
    pub(crate) id: RequestId,
    pub(crate) resource: ResourceId,
    pub(crate) signal: Signal,
}

impl Request {
    /// The ID of this request, unique throughout the entire simulation.
    #[must_use]
    pub fn id(&self) -> RequestId {
        self.id
    }

    /// The resource this request was made to.
    #[must_use]
    pub fn resource(&self) -> ResourceId {
        self.resource
    }

    /// Signal triggered at the moment of the grant.
    #[must_use]
    pub fn signal(&self) -> Signal {
        self.signal
    }
}

/// Capacity-limited resource with first-come, first-served admission.
///
/// The resource does not know anything about processes: it hands out grants to opaque tickets
/// of type `T`. At no point the number of granted tickets exceeds the capacity.
///
/// # Examples
///
/// ```
/// # use simkern::Resource;
/// let mut resource = Resource::new(1);
/// assert!(resource.request("A"));
/// assert!(!resource.request("B"));
/// assert!(!resource.request("C"));
/// assert_eq!(resource.release(), Some("B"));
/// assert_eq!(resource.release(), Some("C"));
/// assert_eq!(resource.release(), None);
/// assert_eq!(resource.users(), 0);
/// ```
#[derive(Debug)]
pub struct Resource<T> {
    capacity: usize,
    users: usize,
    queue: VecDeque<T>,
}

impl<T: PartialEq> Resource<T> {
    /// Creates a resource with the given capacity.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is 0, because such a resource could never grant anything.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "resource capacity must be positive");
        Self {
            capacity,
            users: 0,
            queue: VecDeque::new(),
        }
    }

    /// Requests a unit of capacity for `ticket`.
    /// Returns `true` if granted right away; otherwise, the ticket is queued.
    pub fn request(&mut self, ticket: T) -> bool {
        if self.users < self.capacity {
            self.users += 1;
            true
        } else {
            self.queue.push_back(ticket);
            false
        }
    }

    /// Releases a unit of capacity held by a granted ticket, and passes it on to the first
    /// waiting ticket, which is returned.
    ///
    /// # Panics
    ///
    /// Panics if nothing is currently granted.
    pub fn release(&mut self) -> Option<T> {
        assert!(self.users > 0, "released a resource that was not held");
        self.users -= 1;
        let next = self.queue.pop_front();
        if next.is_some() {
            self.users += 1;
        }
        next
    }

    /// Removes a waiting ticket from the queue. Returns `false` if it was not queued.
    pub fn withdraw(&mut self, ticket: &T) -> bool {
        if let Some(pos) = self.queue.iter().position(|t| t == ticket) {
            self.queue.remove(pos);
            true
        } else {
            false
        }
    }

    /// Maximum number of simultaneous holders.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of currently granted tickets.
    #[must_use]
    pub fn users(&self) -> usize {
        self.users
    }

    /// Number of tickets waiting for a grant.
    #[must_use]
    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }
}
