use super::MeshId;

/// A host-owned mesh, referenced weakly by coupling data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mesh {
    id: MeshId,
    name: String,
    dimensions: usize,
}

impl Mesh {
    #[must_use]
    pub fn new(id: MeshId, name: impl Into<String>, dimensions: usize) -> Self {
        Self {
            id,
            name: name.into(),
            dimensions,
        }
    }

    #[must_use]
    pub fn id(&self) -> MeshId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }
}
