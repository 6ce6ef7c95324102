//! Ordered fallback chains: named rules tried in order until one yields a value.

/// An ordered list of named `Option`-returning rules over an input `I`.
pub struct FallbackChain<'a, I: ?Sized, T> {
    rules: Vec<(&'static str, Box<dyn Fn(&I) -> Option<T> + 'a>)>,
}

impl<'a, I: ?Sized, T> Default for FallbackChain<'a, I, T> {
    fn default() -> Self {
        Self { rules: Vec::new() }
    }
}

impl<'a, I: ?Sized, T> FallbackChain<'a, I, T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rule(mut self, name: &'static str, f: impl Fn(&I) -> Option<T> + 'a) -> Self {
        self.rules.push((name, Box::new(f)));
        self
    }

    /// Value of the first rule that matches, with the rule's name.
    pub fn resolve_named(&self, input: &I) -> Option<(&'static str, T)> {
        self.rules
            .iter()
            .find_map(|(name, f)| f(input).map(|v| (*name, v)))
    }

    pub fn resolve(&self, input: &I) -> Option<T> {
        self.resolve_named(input).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
