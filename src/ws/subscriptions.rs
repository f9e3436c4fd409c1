//! Subscription tracking and diffing.

use crate::shared::Channel;
use std::collections::BTreeSet;

/// A set of channel subscriptions.
///
/// The sync keeps two of these: the channels the caller wants, and the
/// channels the current connection has actually been sent. Diffing the two
/// yields the messages still owed to the server.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionSet {
    channels: BTreeSet<Channel>,
}

/// What has to be sent to bring one set in line with another.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionDiff {
    pub added: Vec<Channel>,
    pub removed: Vec<Channel>,
}

impl SubscriptionDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

impl SubscriptionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add channels; returns the ones that were not already present.
    pub fn insert_all<I, C>(&mut self, channels: I) -> Vec<Channel>
    where
        I: IntoIterator<Item = C>,
        C: Into<Channel>,
    {
        channels
            .into_iter()
            .map(Into::into)
            .filter(|c: &Channel| !c.as_str().is_empty())
            .filter(|c| self.channels.insert(c.clone()))
            .collect()
    }

    /// Remove channels; returns the ones that were present.
    pub fn remove_all<I, C>(&mut self, channels: I) -> Vec<Channel>
    where
        I: IntoIterator<Item = C>,
        C: Into<Channel>,
    {
        channels
            .into_iter()
            .map(Into::into)
            .filter(|c: &Channel| self.channels.remove(c))
            .collect()
    }

    /// Channels in `self` missing from `sent`, and channels in `sent` no
    /// longer in `self`.
    pub fn diff(&self, sent: &SubscriptionSet) -> SubscriptionDiff {
        SubscriptionDiff {
            added: self.channels.difference(&sent.channels).cloned().collect(),
            removed: sent.channels.difference(&self.channels).cloned().collect(),
        }
    }

    pub fn contains(&self, channel: &str) -> bool {
        self.channels.iter().any(|c| c.as_str() == channel)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Channel> {
        self.channels.iter()
    }

    pub fn to_vec(&self) -> Vec<Channel> {
        self.channels.iter().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.channels.clear();
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

impl<C: Into<Channel>> FromIterator<C> for SubscriptionSet {
    fn from_iter<I: IntoIterator<Item = C>>(iter: I) -> Self {
        let mut set = Self::new();
        set.insert_all(iter);
        set
    }
}
