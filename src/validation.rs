use rocket::response::{Flash, Redirect};
use tracing::instrument;
use validator::{Validate, ValidationErrors};

use crate::error::AppError;

/// Picks one human-readable message out of a set of field errors. Fields are
/// visited in name order so the same input always yields the same message.
pub fn first_message(errors: &ValidationErrors) -> String {
    let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
    fields.sort_by_key(|(field, _)| field.to_string());

    fields
        .into_iter()
        .find_map(|(field, field_errors)| {
            field_errors.first().map(|error| {
                error
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("{} is invalid", field))
            })
        })
        .unwrap_or_else(|| "Invalid form input".to_string())
}

pub trait FormValidateExt {
    /// Validates the form, turning the first failure into a flash message
    /// on a redirect back to `back_to`.
    fn validate_or_flash(&self, back_to: &'static str) -> Result<(), Flash<Redirect>>;
}

impl<T: Validate> FormValidateExt for T {
    #[instrument(skip(self))]
    fn validate_or_flash(&self, back_to: &'static str) -> Result<(), Flash<Redirect>> {
        self.validate().map_err(|errors| {
            let message = first_message(&errors);
            tracing::warn!(message = %message, "Form validation failed");
            Flash::error(Redirect::to(back_to), message)
        })
    }
}

pub trait AppErrorExt<T> {
    /// Splits user-facing validation failures (flashed back to the form)
    /// from everything else (left as errors for the responder).
    fn flash_validation(self, back_to: &'static str)
    -> Result<Result<T, Flash<Redirect>>, AppError>;
}

impl<T> AppErrorExt<T> for Result<T, AppError> {
    fn flash_validation(
        self,
        back_to: &'static str,
    ) -> Result<Result<T, Flash<Redirect>>, AppError> {
        match self {
            Ok(value) => Ok(Ok(value)),
            Err(AppError::Validation(message)) => {
                tracing::warn!(message = %message, "Request rejected");
                Ok(Err(Flash::error(Redirect::to(back_to), message)))
            }
            Err(err) => Err(err),
        }
    }
}
