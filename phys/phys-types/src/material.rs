//! Surface materials and their pairwise combination.
//!
//! Every body carries a [`MaterialId`]; the solver looks both ids up in a
//! [`MaterialTable`] and combines them with a geometric mean, so a material
//! with zero friction makes every pairing frictionless.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Index into a [`MaterialTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MaterialId(pub u16);

impl MaterialId {
    /// The material every table starts with.
    pub const DEFAULT: Self = Self(0);
}

/// Contact response coefficients of a surface.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Material {
    /// Coefficient of restitution in `[0, 1]`.
    pub restitution: f64,
    /// Fraction of relative tangential velocity removed per contact, in `[0, 1]`.
    pub friction: f64,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            restitution: 0.3,
            friction: 0.1,
        }
    }
}

impl Material {
    /// Create a material.
    #[must_use]
    pub const fn new(restitution: f64, friction: f64) -> Self {
        Self {
            restitution,
            friction,
        }
    }

    /// Perfectly elastic, frictionless.
    #[must_use]
    pub const fn elastic() -> Self {
        Self::new(1.0, 0.0)
    }

    /// Combine two materials (geometric mean of each coefficient).
    #[must_use]
    pub fn combine(&self, other: &Self) -> Self {
        Self {
            restitution: (self.restitution * other.restitution).sqrt(),
            friction: (self.friction * other.friction).sqrt(),
        }
    }

    fn is_valid(&self) -> bool {
        (0.0..=1.0).contains(&self.restitution) && (0.0..=1.0).contains(&self.friction)
    }
}

/// Lookup table of materials.
///
/// The table is never empty: slot 0 always exists and is the fallback for
/// unknown ids.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MaterialTable {
    materials: Vec<Material>,
}

impl Default for MaterialTable {
    fn default() -> Self {
        Self::new(Material::default())
    }
}

impl MaterialTable {
    /// Create a table whose default material is `base`.
    #[must_use]
    pub fn new(base: Material) -> Self {
        Self {
            materials: vec![base],
        }
    }

    /// Register a material and return its id.
    ///
    /// # Errors
    ///
    /// Returns [`crate::PhysError::InvalidConfig`] once every `u16` id is
    /// taken. The table is left unchanged.
    pub fn insert(&mut self, material: Material) -> crate::Result<MaterialId> {
        let id = u16::try_from(self.materials.len()).map_err(|_| {
            crate::PhysError::invalid_config(format!(
                "material table is full ({} entries)",
                self.materials.len()
            ))
        })?;
        self.materials.push(material);
        Ok(MaterialId(id))
    }

    /// Replace a material in place. Unknown ids are ignored.
    pub fn set(&mut self, id: MaterialId, material: Material) {
        if let Some(slot) = self.materials.get_mut(usize::from(id.0)) {
            *slot = material;
        }
    }

    /// Look up a material, falling back to the default one.
    #[must_use]
    pub fn get(&self, id: MaterialId) -> Material {
        self.materials
            .get(usize::from(id.0))
            .or_else(|| self.materials.first())
            .copied()
            .unwrap_or_default()
    }

    /// Combined coefficients for a contact between two materials.
    #[must_use]
    pub fn combine(&self, a: MaterialId, b: MaterialId) -> Material {
        self.get(a).combine(&self.get(b))
    }

    /// Number of registered materials.
    #[must_use]
    pub fn len(&self) -> usize {
        self.materials.len()
    }

    /// Always false; kept for API symmetry with `len`.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }

    /// Check every coefficient is within `[0, 1]`.
    pub fn validate(&self) -> crate::Result<()> {
        if self.materials.is_empty() {
            return Err(crate::PhysError::invalid_config("material table is empty"));
        }
        for (i, material) in self.materials.iter().enumerate() {
            if !material.is_valid() {
                return Err(crate::PhysError::invalid_config(format!(
                    "material {i} has coefficients outside [0, 1]: {material:?}"
                )));
            }
        }
        Ok(())
    }
}
