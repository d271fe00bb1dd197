//! The report ingestion pipeline.
//!
//! A run walks the stages in order: [`scan`] reads the record list and keeps
//! eligible rows, [`resolve`] locates each row's workbook in the document
//! library, [`extract`] pulls the fixed-layout report out of the workbook
//! bytes, [`publish`] writes the text artifact, and [`track`] flips the
//! processed flag. [`runner`] drives one record after another and keeps item
//! failures from spilling into the rest of the run.

pub mod extract;
pub mod publish;
pub mod resolve;
pub mod runner;
pub mod scan;
pub mod track;
pub mod types;
