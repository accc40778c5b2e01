use std::collections::{BTreeMap, BTreeSet, HashMap};

use super::Signal;

/// Objects a listener wants to hear from.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ObjectFilter {
    Any,
    Only(BTreeSet<String>),
}

impl ObjectFilter {
    fn from_objects(objects: Vec<String>) -> Self {
        if objects.is_empty() {
            Self::Any
        } else {
            Self::Only(objects.into_iter().collect())
        }
    }

    fn admits(&self, path: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Only(paths) => paths.contains(path),
        }
    }
}

#[derive(Debug, Default)]
struct ConnectionFilters {
    every_signal: Option<ObjectFilter>,
    by_signal: HashMap<String, ObjectFilter>,
}

impl ConnectionFilters {
    fn wants(&self, name: &str, path: &str) -> bool {
        self.every_signal.as_ref().is_some_and(|f| f.admits(path))
            || self.by_signal.get(name).is_some_and(|f| f.admits(path))
    }

    fn is_empty(&self) -> bool {
        self.every_signal.is_none() && self.by_signal.is_empty()
    }
}

/// Per-connection signal subscriptions.
///
/// A connection listens either to one named signal or, with no name, to
/// every signal; each subscription is limited to a set of objects, or to all
/// objects when the set is empty. Subscribing again replaces the previous
/// object set for that name.
#[derive(Debug, Default)]
pub struct ListenerRegistry {
    connections: BTreeMap<String, ConnectionFilters>,
}

impl ListenerRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe `connection` to `signal` (fully qualified) or to every
    /// signal when `None`.
    pub fn listen(&mut self, connection: &str, signal: Option<&str>, objects: Vec<String>) {
        let filters = self.connections.entry(connection.to_string()).or_default();
        let filter = ObjectFilter::from_objects(objects);
        match signal {
            Some(name) => {
                filters.by_signal.insert(name.to_string(), filter);
            }
            None => filters.every_signal = Some(filter),
        }
    }

    /// Drop one subscription. Returns `false` if there was none.
    pub fn stop_listening(&mut self, connection: &str, signal: Option<&str>) -> bool {
        let Some(filters) = self.connections.get_mut(connection) else {
            return false;
        };
        let removed = match signal {
            Some(name) => filters.by_signal.remove(name).is_some(),
            None => filters.every_signal.take().is_some(),
        };
        if filters.is_empty() {
            self.connections.remove(connection);
        }
        removed
    }

    /// Forget a disconnected connection.
    pub fn remove_connection(&mut self, connection: &str) {
        self.connections.remove(connection);
    }

    /// Whether `connection` should receive `signal`.
    pub fn wants(&self, connection: &str, signal: &Signal) -> bool {
        self.connections
            .get(connection)
            .is_some_and(|f| f.wants(&signal.qualified_name(), &signal.path))
    }

    /// Connections that should receive `signal`, in name order.
    pub fn recipients(&self, signal: &Signal) -> Vec<String> {
        let name = signal.qualified_name();
        self.connections
            .iter()
            .filter(|(_, f)| f.wants(&name, &signal.path))
            .map(|(connection, _)| connection.clone())
            .collect()
    }

    /// Number of connections with at least one subscription.
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Whether nobody listens.
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
