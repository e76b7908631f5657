pub mod document;
pub mod extraction;
pub mod analysis;
pub mod literature;
pub mod processor; // Lab report orchestrator
pub mod diagnostic; // Malformed completion dumps under Config::dump_dir
