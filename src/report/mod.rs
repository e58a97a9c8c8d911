//! Detection report pipeline core: selection, metrics, composition, rendering.

pub mod compose;
pub mod layout;
pub mod metrics;
pub mod pdf;
pub mod select;
pub mod text;

pub use compose::{compose_report, Block, ReportDocument, NO_DETECTION_MESSAGE, REPORT_TITLE};
pub use metrics::{
    derive_record, size_percent, Priority, ReferenceResolution, ReportRecord, TumorClass,
};
pub use pdf::render_pdf;
pub use select::{select_detection, SelectionPolicy};
