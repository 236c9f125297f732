pub mod cascade;
pub mod scanner;

// Re-export main types for convenient access
pub use cascade::{
    resolve_stutter_type, CascadeConfig, ClassificationResult, ClassifierCascade, StutterType,
};
pub use scanner::{ScanConfig, ScanResult, Window, WindowClassifier, WindowScanner};
