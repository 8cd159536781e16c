//! Message filtering.

use crate::message::Message;

/// Filtering criteria applied to inbound messages before dispatch.
pub trait MessageFilter: Send + Sync {
    /// Whether the message satisfies this filter.
    fn matches(&self, msg: &Message) -> bool;
}

/// Filter policies for [`RuleBasedMessageFilter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterPolicy {
    /// Pass only messages matched by a permit rule and no forbid rule.
    #[default]
    ExactMatchingToAccessList,
    /// Pass everything except messages matched by a forbid rule.
    PermitAllExceptForbidden,
    /// Drop everything except messages matched by a permit rule.
    ForbidAllExceptPermitted,
}

/// A single filtering rule.
pub type FilterRule = Box<dyn Fn(&Message) -> bool + Send + Sync>;

/// Rule-based message filter: permit and forbid rule lists combined under a
/// [`FilterPolicy`].
#[derive(Default)]
pub struct RuleBasedMessageFilter {
    policy: FilterPolicy,
    permitted: Vec<FilterRule>,
    forbidden: Vec<FilterRule>,
}

impl RuleBasedMessageFilter {
    pub fn new(policy: FilterPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    /// Adds a rule whose match permits a message.
    pub fn permit(&mut self, rule: impl Fn(&Message) -> bool + Send + Sync + 'static) -> &mut Self {
        self.permitted.push(Box::new(rule));
        self
    }

    /// Adds a rule whose match forbids a message.
    pub fn forbid(&mut self, rule: impl Fn(&Message) -> bool + Send + Sync + 'static) -> &mut Self {
        self.forbidden.push(Box::new(rule));
        self
    }

    fn satisfies(msg: &Message, rules: &[FilterRule]) -> bool {
        rules.iter().any(|rule| rule(msg))
    }
}

impl MessageFilter for RuleBasedMessageFilter {
    fn matches(&self, msg: &Message) -> bool {
        match self.policy {
            FilterPolicy::PermitAllExceptForbidden => !Self::satisfies(msg, &self.forbidden),
            FilterPolicy::ForbidAllExceptPermitted => Self::satisfies(msg, &self.permitted),
            FilterPolicy::ExactMatchingToAccessList => {
                Self::satisfies(msg, &self.permitted) && !Self::satisfies(msg, &self.forbidden)
            }
        }
    }
}

/// Conjunction of filters; a message passes when every filter matches. An
/// empty chain passes everything.
#[derive(Default)]
pub struct MessageFilterChain {
    filters: parking_lot::Mutex<Vec<Box<dyn MessageFilter>>>,
}

impl MessageFilterChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_filter(&self, filter: impl MessageFilter + 'static) -> &Self {
        self.filters.lock().push(Box::new(filter));
        self
    }

    pub fn matches(&self, msg: &Message) -> bool {
        self.filters.lock().iter().all(|f| f.matches(msg))
    }
}

impl std::fmt::Debug for MessageFilterChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageFilterChain")
            .field("filters", &self.filters.lock().len())
            .finish()
    }
}
