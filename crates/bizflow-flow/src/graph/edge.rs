use std::fmt;

use super::context::Context;

/// Predicate deciding whether a connection fires.
pub type Guard = dyn Fn(&Context) -> bool + Send + Sync;

/// A directed link between two nodes, optionally guarded.
pub struct Connection {
    from: String,
    to: String,
    label: Option<String>,
    guard: Option<Box<Guard>>,
}

impl Connection {
    /// Create an unconditional connection.
    pub fn always(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            label: None,
            guard: None,
        }
    }

    /// Create a connection that fires when `guard` holds.
    pub fn when<F>(
        from: impl Into<String>,
        to: impl Into<String>,
        label: impl Into<String>,
        guard: F,
    ) -> Self
    where
        F: Fn(&Context) -> bool + Send + Sync + 'static,
    {
        Self {
            from: from.into(),
            to: to.into(),
            label: Some(label.into()),
            guard: Some(Box::new(guard)),
        }
    }

    /// Create a connection that fires when the source node produced `true`.
    ///
    /// A missing or non-boolean source result does not fire.
    pub fn when_true(from: impl Into<String>, to: impl Into<String>) -> Self {
        let from = from.into();
        let source = from.clone();
        Self::when(from, to, "true", move |ctx: &Context| {
            matches!(ctx.result_as::<bool>(&source), Ok(Some(true)))
        })
    }

    /// Create a connection that fires unless the source node produced `true`.
    ///
    /// NOTE: not the exact complement of [`Connection::when_true`] on bad
    /// input. A missing or non-boolean source result fires this edge, so
    /// evaluation failures fall through to the false branch. Callers rely on
    /// this default path; keep it.
    pub fn when_false(from: impl Into<String>, to: impl Into<String>) -> Self {
        let from = from.into();
        let source = from.clone();
        Self::when(from, to, "false", move |ctx: &Context| {
            !matches!(ctx.result_as::<bool>(&source), Ok(Some(true)))
        })
    }

    pub fn from(&self) -> &str {
        &self.from
    }

    pub fn to(&self) -> &str {
        &self.to
    }

    /// Guard label, `None` for unconditional connections.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn is_conditional(&self) -> bool {
        self.guard.is_some()
    }

    /// Whether this connection fires for the current context.
    pub fn can_traverse(&self, context: &Context) -> bool {
        match &self.guard {
            Some(guard) => guard(context),
            None => true,
        }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("from", &self.from)
            .field("to", &self.to)
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}
