//! Observability for identity flows and directory calls.
//!
//! Each [`Operation`] runs inside a `directory_portal.op` span with `op` and `stage` fields and
//! logs a warning when it fails. With the `metrics` feature enabled, the
//! `directory_portal_operation_total` counter is incremented per attempt and per terminal
//! outcome, labeled by `op` and `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Operations the portal reports on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
	/// Redeeming an authorization code.
	SignIn,
	/// Renewing a delegated token with its refresh token.
	Silent,
	/// Acquiring an application token.
	AppToken,
	/// Reading profile fields.
	DirectoryRead,
	/// Patching profile fields.
	DirectoryWrite,
}
impl Operation {
	/// Label used in span and metric fields.
	pub const fn label(self) -> &'static str {
		match self {
			Self::SignIn => "sign_in",
			Self::Silent => "silent",
			Self::AppToken => "app_token",
			Self::DirectoryRead => "directory_read",
			Self::DirectoryWrite => "directory_write",
		}
	}
}

/// Counter label for one step of an operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Outcome {
	/// The operation started.
	Attempt,
	/// It returned `Ok`.
	Success,
	/// It returned `Err`.
	Failure,
}
impl Outcome {
	/// Label used in metric fields.
	pub const fn label(self) -> &'static str {
		match self {
			Self::Attempt => "attempt",
			Self::Success => "success",
			Self::Failure => "failure",
		}
	}
}

/// Runs `fut` inside the span of `op`, counting the attempt and its outcome.
pub async fn observe<T, F>(op: Operation, stage: &'static str, fut: F) -> Result<T>
where
	F: Future<Output = Result<T>>,
{
	count(op, Outcome::Attempt);

	let result = OpSpan::new(op, stage).instrument(fut).await;

	match &result {
		Ok(_) => count(op, Outcome::Success),
		Err(e) => {
			::tracing::warn!(op = op.label(), stage, error = %e, "Operation failed.");

			count(op, Outcome::Failure);
		},
	}

	result
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[tokio::test]
	async fn observe_passes_the_result_through() {
		let ok = observe(Operation::DirectoryRead, "ok", async { Ok(7) }).await;

		assert_eq!(ok.ok(), Some(7));

		let err = observe::<(), _>(Operation::AppToken, "err", async {
			Err(Error::StateMismatch)
		})
		.await;

		assert!(matches!(err, Err(Error::StateMismatch)));
	}
}
