// self
use crate::obs::{Operation, Outcome};

/// Increments the operation counter on the global recorder; a no-op without the `metrics` feature.
pub fn count(op: Operation, outcome: Outcome) {
	#[cfg(feature = "metrics")]
	metrics::counter!(
		"directory_portal_operation_total",
		"op" => op.label(),
		"outcome" => outcome.label()
	)
	.increment(1);

	#[cfg(not(feature = "metrics"))]
	let _ = (op, outcome);
}
