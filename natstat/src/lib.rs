pub mod conntrack;
pub mod report;
