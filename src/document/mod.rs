/*!
 * Structured content model of a paginated document.
 */

pub mod model;
pub mod reading_order;

pub use model::{
    BoundingBox, Color, ColorSpace, ContentBlock, Document, DocumentStatistics, ImageBlock, ImageEncoding, Page,
    RasterImage, SourcePdf, TextBlock,
};
pub use reading_order::assign_reading_order;
