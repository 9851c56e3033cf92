use warren_spec::PackageSpec;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DepType {
    Prod,
    Dev,
    Opt,
}

/// A requirement relation between two nodes. Edges express who needs whom;
/// they never own anything and are independent of where nodes physically sit
/// in the hierarchy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub(crate) requested: PackageSpec,
    pub(crate) dep_type: DepType,
}

impl Edge {
    pub(crate) fn new(requested: PackageSpec, dep_type: DepType) -> Self {
        Self {
            requested,
            dep_type,
        }
    }
}
