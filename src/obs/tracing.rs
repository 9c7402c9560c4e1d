// crates.io
use tracing::{Instrument, Span, instrument::Instrumented, span::EnteredSpan};
// self
use crate::{_prelude::*, obs::Operation};

/// Span attached to one operation.
#[derive(Clone, Debug)]
pub struct OpSpan(Span);
impl OpSpan {
	/// Opens a span for `op` at `stage`.
	pub fn new(op: Operation, stage: &'static str) -> Self {
		Self(tracing::info_span!("directory_portal.op", op = op.label(), stage))
	}

	/// Enters the span until the guard drops; for synchronous code only.
	pub fn entered(self) -> EnteredSpan {
		self.0.entered()
	}

	/// Attaches the span to `fut`.
	pub fn instrument<Fut>(&self, fut: Fut) -> Instrumented<Fut>
	where
		Fut: Future,
	{
		fut.instrument(self.0.clone())
	}
}
