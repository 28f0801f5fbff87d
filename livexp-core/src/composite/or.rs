//! Boolean "or" over child nodes.

use std::ops::Deref;

use super::CompositeExpression;
use crate::reactive::LiveExpression;

/// True while any child is true. Children are read in order and reading
/// stops at the first true one.
#[derive(Clone)]
pub struct OrExpression {
    composite: CompositeExpression<bool, bool>,
}

impl OrExpression {
    pub fn new() -> Self {
        Self {
            composite: CompositeExpression::new(false, |children: &[LiveExpression<bool>]| {
                children.iter().any(|child| child.get_value())
            }),
        }
    }

    pub fn add_child(&self, child: LiveExpression<bool>) -> &Self {
        self.composite.add_child(child);
        self
    }
}

impl Default for OrExpression {
    fn default() -> Self {
        Self::new()
    }
}

impl Deref for OrExpression {
    type Target = CompositeExpression<bool, bool>;

    fn deref(&self) -> &Self::Target {
        &self.composite
    }
}
