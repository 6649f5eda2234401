pub mod cleaner;
pub mod columns;
pub mod dates;
pub mod forecast;
pub mod insights;
pub mod loader;
pub mod outliers;
pub mod quality;
pub mod sample_data;
pub mod segmentation;
pub mod statistics;
pub mod table;
