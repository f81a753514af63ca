//! Action filtering
//!
//! [`MessageFilter`] wraps any [`TraceFormatReader`] and only yields messages
//! whose action passes an include/exclude list.

use crate::error::TraceError;
use crate::message::ParsedMessage;
use crate::readers::TraceFormatReader;
use serde::{Deserialize, Serialize};
use std::io::BufRead;
use std::path::Path;

/// How the action list is applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterMode {
    /// Only listed actions pass (empty list passes everything)
    #[default]
    Include,
    /// Listed actions are dropped
    Exclude,
}

/// Include/exclude list of action identifiers
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ActionFilter {
    /// Filter mode
    #[serde(default)]
    pub mode: FilterMode,
    /// Action identifiers, compared exactly
    #[serde(default)]
    pub actions: Vec<String>,
}

impl ActionFilter {
    /// Filter that passes every action
    #[inline]
    #[must_use]
    pub fn pass_all() -> Self {
        Self::default()
    }

    /// Include only the given actions
    #[must_use]
    pub fn include<I, S>(actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            mode: FilterMode::Include,
            actions: actions.into_iter().map(Into::into).collect(),
        }
    }

    /// Drop the given actions
    #[must_use]
    pub fn exclude<I, S>(actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            mode: FilterMode::Exclude,
            actions: actions.into_iter().map(Into::into).collect(),
        }
    }

    /// Check an action against the list
    #[must_use]
    pub fn passes(&self, action: &str) -> bool {
        match self.mode {
            FilterMode::Include => {
                self.actions.is_empty() || self.actions.iter().any(|a| a == action)
            }
            FilterMode::Exclude => !self.actions.iter().any(|a| a == action),
        }
    }
}

/// Callback invoked with every message read, before the filter decides
pub type FilterObserver = Box<dyn FnMut(&ParsedMessage)>;

/// Reader adapter that drops messages failing an [`ActionFilter`]
pub struct MessageFilter<R> {
    inner: R,
    filter: ActionFilter,
    observer: Option<FilterObserver>,
    seen: usize,
    passed: usize,
}

impl<R: TraceFormatReader> MessageFilter<R> {
    /// Wrap a reader
    #[must_use]
    pub fn new(inner: R, filter: ActionFilter) -> Self {
        Self {
            inner,
            filter,
            observer: None,
            seen: 0,
            passed: 0,
        }
    }

    /// Builder: observe every message before it is filtered
    #[must_use]
    pub fn with_observer(mut self, observer: impl FnMut(&ParsedMessage) + 'static) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    /// Active filter
    #[inline]
    #[must_use]
    pub fn filter(&self) -> &ActionFilter {
        &self.filter
    }

    /// Messages read from the inner reader so far
    #[inline]
    #[must_use]
    pub fn seen(&self) -> usize {
        self.seen
    }

    /// Messages that passed the filter so far
    #[inline]
    #[must_use]
    pub fn passed(&self) -> usize {
        self.passed
    }

    /// Unwrap the inner reader
    #[inline]
    #[must_use]
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R> std::fmt::Debug for MessageFilter<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageFilter")
            .field("filter", &self.filter)
            .field("seen", &self.seen)
            .field("passed", &self.passed)
            .finish()
    }
}

impl<R: TraceFormatReader> TraceFormatReader for MessageFilter<R> {
    fn setup(
        &mut self,
        source: Box<dyn BufRead>,
        file_name: &Path,
        client_side: bool,
        service_side: bool,
    ) -> Result<(), TraceError> {
        self.inner.setup(source, file_name, client_side, service_side)
    }

    fn read_next(&mut self) -> Result<Option<ParsedMessage>, TraceError> {
        while let Some(message) = self.inner.read_next()? {
            self.seen += 1;
            if let Some(observer) = self.observer.as_mut() {
                observer(&message);
            }
            if self.filter.passes(message.action()) {
                self.passed += 1;
                return Ok(Some(message));
            }
            tracing::debug!(action = message.action(), "message filtered out");
        }
        tracing::debug!(seen = self.seen, passed = self.passed, "trace exhausted");
        Ok(None)
    }

    fn name(&self) -> &'static str {
        self.inner.name()
    }
}
