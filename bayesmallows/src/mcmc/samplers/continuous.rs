mod alpha;

pub use alpha::AlphaRandomWalk;
