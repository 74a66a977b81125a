//! Strategies used by bulk rename and delete
//!
//! Anything implementing [`Selector`] picks units out of the aggregate, and a
//! [`Renamer`] computes the new label for each picked unit. Plain closures
//! implement both traits.
use crate::unit::TimedUnit;

/// Decides whether a unit takes part in a bulk operation
pub trait Selector {
    /// true if `unit` should be renamed or deleted
    fn matches(&self, unit: &TimedUnit) -> bool;
}

impl<F> Selector for F
where
    F: Fn(&TimedUnit) -> bool,
{
    fn matches(&self, unit: &TimedUnit) -> bool {
        self(unit)
    }
}

/// Computes the new label of a selected unit
pub trait Renamer {
    /// new label for `unit`
    fn rename(&self, unit: &TimedUnit) -> String;
}

impl<F> Renamer for F
where
    F: Fn(&TimedUnit) -> String,
{
    fn rename(&self, unit: &TimedUnit) -> String {
        self(unit)
    }
}

/// Selects units whose label equals the given one
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelIs(pub String);

impl Selector for LabelIs {
    fn matches(&self, unit: &TimedUnit) -> bool {
        unit.label() == self.0
    }
}

/// Selects units whose label starts with the given prefix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelPrefix(pub String);

impl Selector for LabelPrefix {
    fn matches(&self, unit: &TimedUnit) -> bool {
        unit.label().starts_with(&self.0)
    }
}

/// Replaces a leading `old` prefix with `new`, keeping the remainder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplacePrefix {
    /// prefix to strip
    pub old: String,
    /// prefix to put in its place
    pub new: String,
}

impl Renamer for ReplacePrefix {
    fn rename(&self, unit: &TimedUnit) -> String {
        match unit.label().strip_prefix(&self.old) {
            Some(rest) => format!("{}{rest}", self.new),
            None => unit.label().to_owned(),
        }
    }
}

/// Renames every selected unit to the same fixed label
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedLabel(pub String);

impl Renamer for FixedLabel {
    fn rename(&self, _unit: &TimedUnit) -> String {
        self.0.clone()
    }
}
