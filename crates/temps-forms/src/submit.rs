use std::future::Future;

use temps_core::ServiceError;
use tracing::debug;

use crate::collect::{collect, CollectOptions, FormValues};
use crate::element::InputElement;
use crate::error::FormError;

/// A form submission: the form's elements at the time of submit plus
/// whether the default (full page) submission was cancelled
#[derive(Debug, Clone, Default)]
pub struct SubmitEvent {
    elements: Vec<InputElement>,
    default_prevented: bool,
}

impl SubmitEvent {
    pub fn new(elements: Vec<InputElement>) -> Self {
        Self {
            elements,
            default_prevented: false,
        }
    }

    pub fn prevent_default(&mut self) {
        self.default_prevented = true;
    }

    pub fn default_prevented(&self) -> bool {
        self.default_prevented
    }

    pub fn elements(&self) -> &[InputElement] {
        &self.elements
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FormSubmitter {
    options: CollectOptions,
}

impl FormSubmitter {
    pub fn new(options: CollectOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> CollectOptions {
        self.options
    }

    /// Check required fields against the collected values. Disabled
    /// elements are never validated.
    pub fn validate(&self, elements: &[InputElement], values: &FormValues) -> Result<(), FormError> {
        let missing = elements
            .iter()
            .filter(|el| el.required && !el.disabled && !el.name.is_empty())
            .find(|el| values.get(&el.name).map_or(true, |v| v.is_falsy()));

        match missing {
            Some(element) => Err(FormError::MissingField(element.name.clone())),
            None => Ok(()),
        }
    }

    /// Handle a submit event: cancel the default submission, collect and
    /// validate the values, then hand them to `handle_submit`. The handler is
    /// not called when validation fails, and its own error is returned as is.
    pub async fn on_submit<F, Fut, T>(
        &self,
        event: &mut SubmitEvent,
        handle_submit: F,
    ) -> Result<T, FormError>
    where
        F: FnOnce(FormValues) -> Fut,
        Fut: Future<Output = Result<T, ServiceError>>,
    {
        event.prevent_default();

        let values = collect(event.elements(), self.options);
        self.validate(event.elements(), &values)?;

        debug!("Submitting form with {} fields", values.len());
        Ok(handle_submit(values).await?)
    }
}
