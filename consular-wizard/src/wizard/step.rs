use std::fmt;
use std::sync::Arc;

pub type StepPredicate<D> = Arc<dyn Fn(&D) -> bool + Send + Sync>;

/// One named step of a wizard and the gate that must hold before leaving it.
///
/// The predicate must be a pure function of the form data and may only read fields that
/// are collected on this step or an earlier one.
pub struct StepDefinition<D> {
    id: String,
    title: String,
    is_valid: StepPredicate<D>,
}

impl<D> StepDefinition<D> {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        is_valid: impl Fn(&D) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            is_valid: Arc::new(is_valid),
        }
    }

    /// A step with no requirement (e.g. a welcome or review page).
    pub fn open(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self::new(id, title, |_| true)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn is_valid(&self, data: &D) -> bool {
        (self.is_valid)(data)
    }
}

impl<D> Clone for StepDefinition<D> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            title: self.title.clone(),
            is_valid: Arc::clone(&self.is_valid),
        }
    }
}

impl<D> fmt::Debug for StepDefinition<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepDefinition")
            .field("id", &self.id)
            .field("title", &self.title)
            .finish_non_exhaustive()
    }
}
