mod walk;

pub use walk::list_files;
