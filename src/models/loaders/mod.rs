pub mod seed_loader;

pub use seed_loader::{load_seed_file, load_work_items, parse_seed_lines, SeedSource};
