//! Generation context
//!
//! State shared by every generator call in one run: the stack of statement
//! sinks, the nesting depth and the temporary-name counter. The context is
//! passed by `&mut` so generators stay free of mutable fields.

use crate::ast::Stmt;
use crate::error::CodegenError;
use std::collections::HashSet;

/// Deepest nesting the object-graph generator accepts
pub const MAX_DEPTH: usize = 20;

/// Mutable state of one generation run
#[derive(Debug)]
pub struct GenContext {
    sinks: Vec<Vec<Stmt>>,
    depth: usize,
    max_depth: usize,
    temp_counter: usize,
    locals: HashSet<String>,
}

impl Default for GenContext {
    fn default() -> Self {
        Self::new()
    }
}

impl GenContext {
    /// Create context with one empty sink
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_depth(MAX_DEPTH)
    }

    /// Create context with a custom depth ceiling
    #[must_use]
    pub fn with_max_depth(max_depth: usize) -> Self {
        Self {
            sinks: vec![Vec::new()],
            depth: 0,
            max_depth,
            temp_counter: 0,
            locals: HashSet::new(),
        }
    }

    /// Append a statement to the active sink
    pub fn emit(&mut self, stmt: Stmt) {
        if let Some(sink) = self.sinks.last_mut() {
            sink.push(stmt);
        }
    }

    /// Redirect output to a fresh sink
    pub fn push_sink(&mut self) {
        self.sinks.push(Vec::new());
    }

    /// Close the active sink and return its statements
    ///
    /// The root sink is drained rather than removed.
    pub fn pop_sink(&mut self) -> Vec<Stmt> {
        if self.sinks.len() > 1 {
            self.sinks.pop().unwrap_or_default()
        } else {
            self.sinks.first_mut().map(std::mem::take).unwrap_or_default()
        }
    }

    /// Number of open sinks, the root included
    #[inline]
    #[must_use]
    pub fn sink_depth(&self) -> usize {
        self.sinks.len()
    }

    /// Current nesting depth
    #[inline]
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Run `f` one nesting level deeper
    ///
    /// Fails with [`CodegenError::DepthExceeded`] once the ceiling is passed,
    /// whether or not the graph really contains a cycle.
    pub fn nested<T>(
        &mut self,
        target: &str,
        f: impl FnOnce(&mut Self) -> Result<T, CodegenError>,
    ) -> Result<T, CodegenError> {
        if self.depth >= self.max_depth {
            return Err(CodegenError::DepthExceeded {
                limit: self.max_depth,
                target: target.to_string(),
            });
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    /// Start a new method body whose parameters and locals are `taken`
    ///
    /// The temporary counter keeps running, so names stay unique across the run.
    pub fn begin_method<I, S>(&mut self, taken: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.locals = taken.into_iter().map(Into::into).collect();
    }

    /// Fresh temporary name derived from `hint` (`order3`, `lineArray4`)
    pub fn temp_name(&mut self, hint: &str) -> String {
        let base = lower_camel(hint);
        loop {
            self.temp_counter += 1;
            let name = format!("{}{}", base, self.temp_counter);
            if self.locals.insert(name.clone()) {
                return name;
            }
        }
    }

    /// `name` itself when unused in the current method, else a temporary
    pub fn local_name(&mut self, name: &str) -> String {
        if self.locals.insert(name.to_string()) {
            name.to_string()
        } else {
            self.temp_name(name)
        }
    }
}

/// `Order` -> `order`; non-identifier characters dropped
fn lower_camel(hint: &str) -> String {
    let cleaned: String = hint.chars().filter(|c| c.is_alphanumeric() || *c == '_').collect();
    let mut chars = cleaned.chars();
    match chars.next() {
        Some(first) if !first.is_ascii_digit() => first.to_lowercase().chain(chars).collect(),
        _ => "temp".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Expr;

    #[test]
    fn sinks_stack() {
        let mut ctx = GenContext::new();
        ctx.emit(Stmt::Expr(Expr::var("a")));
        ctx.push_sink();
        ctx.emit(Stmt::Expr(Expr::var("b")));
        assert_eq!(ctx.sink_depth(), 2);
        assert_eq!(ctx.pop_sink(), vec![Stmt::Expr(Expr::var("b"))]);
        assert_eq!(ctx.pop_sink(), vec![Stmt::Expr(Expr::var("a"))]);
        assert_eq!(ctx.sink_depth(), 1);
        assert!(ctx.pop_sink().is_empty());
    }

    #[test]
    fn depth_ceiling() {
        fn descend(ctx: &mut GenContext, levels: usize) -> Result<usize, CodegenError> {
            if levels == 0 {
                return Ok(ctx.depth());
            }
            ctx.nested("x", |ctx| descend(ctx, levels - 1))
        }
        let mut ctx = GenContext::new();
        assert_eq!(descend(&mut ctx, 20).unwrap(), 20);
        assert_eq!(ctx.depth(), 0);
        assert!(matches!(
            descend(&mut ctx, 21),
            Err(CodegenError::DepthExceeded { limit: 20, .. })
        ));
        assert_eq!(ctx.depth(), 0);
    }

    #[test]
    fn temp_names_are_unique_across_methods() {
        let mut ctx = GenContext::new();
        ctx.begin_method(["order1"]);
        assert_eq!(ctx.temp_name("Order"), "order2");
        assert_eq!(ctx.temp_name("Line[]"), "line3");
        ctx.begin_method(Vec::<String>::new());
        assert_eq!(ctx.temp_name("Order"), "order4");
        assert_eq!(ctx.temp_name("9lives"), "temp5");
    }

    #[test]
    fn local_names_fall_back_to_temporaries() {
        let mut ctx = GenContext::new();
        ctx.begin_method(["proxy"]);
        assert_eq!(ctx.local_name("result"), "result");
        assert_eq!(ctx.local_name("proxy"), "proxy1");
    }
}
