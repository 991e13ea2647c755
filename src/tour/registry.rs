//! Tour registry
//!
//! Named catalog of tours. The registry is a plain value owned by whoever
//! sets up a test session; runners look tours up in it by name.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;
use tracing::debug;

use super::step::{Step, Tour, TourDef};
use crate::common::{Error, Result};

/// Contents of a tour file
#[derive(Deserialize, Debug)]
pub struct TourFile {
    pub tours: Vec<TourDef>,
}

/// Named tours, unique by name
#[derive(Debug, Default)]
pub struct TourRegistry {
    tours: BTreeMap<String, Arc<Tour>>,
}

impl TourRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `steps` under `name`
    pub fn register(&mut self, name: &str, steps: Vec<Step>) -> Result<Arc<Tour>> {
        self.insert(Tour::new(name, steps))
    }

    /// Register an already-built tour
    ///
    /// Fails with `DuplicateName` if the name is taken; the existing tour is kept.
    pub fn insert(&mut self, tour: Tour) -> Result<Arc<Tour>> {
        if self.tours.contains_key(tour.name()) {
            return Err(Error::DuplicateName(tour.name().to_string()));
        }
        debug!(tour = tour.name(), steps = tour.len(), "tour registered");
        let tour = Arc::new(tour);
        self.tours.insert(tour.name().to_string(), Arc::clone(&tour));
        Ok(tour)
    }

    /// Look up a tour by name
    pub fn get(&self, name: &str) -> Result<Arc<Tour>> {
        self.tours
            .get(name)
            .cloned()
            .ok_or_else(|| Error::NotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tours.contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        self.tours.keys().map(String::as_str).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Tour>> {
        self.tours.values()
    }

    pub fn len(&self) -> usize {
        self.tours.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tours.is_empty()
    }

    /// Register every definition, or none of them
    ///
    /// Returns the registered names in definition order.
    pub fn extend(&mut self, defs: Vec<TourDef>) -> Result<Vec<String>> {
        let mut seen = HashSet::new();
        for def in &defs {
            if self.contains(&def.name) || !seen.insert(def.name.as_str()) {
                return Err(Error::DuplicateName(def.name.clone()));
            }
        }

        let tours = defs
            .into_iter()
            .map(Tour::try_from)
            .collect::<Result<Vec<_>>>()?;

        let mut names = Vec::with_capacity(tours.len());
        for tour in tours {
            names.push(tour.name().to_string());
            self.insert(tour)?;
        }
        Ok(names)
    }

    /// Register the tours of a YAML tour file's contents
    pub fn load_str(&mut self, yaml: &str) -> Result<Vec<String>> {
        let file: TourFile = serde_yaml::from_str(yaml)?;
        self.extend(file.tours)
    }

    /// Register the tours of a YAML tour file
    pub fn load_file(&mut self, path: &Path) -> Result<Vec<String>> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::file_read(path, e))?;
        self.load_str(&content)
    }
}
