//! Per-species traits and the engine's view of them. The scaling formulas
//! themselves are methods on [`MetabolicConfig`].

use crate::core::config::MetabolicConfig;
use crate::core::error::{ModelError, ModelResult};
use crate::engine::{SpeciesKey, SpeciesParams};
use serde::Serialize;
use std::collections::HashMap;

/// Cached physical attributes of one species.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Species {
    pub is_producer: bool,
    /// kg
    pub body_size: f64,
    /// negative, a loss term on the diagonal
    pub interference: f64,
    pub metabolism: f64,
    /// applies when this species is eaten
    pub efficiency: f64,
}

/// Species records keyed by external id, read by the engine during a build.
#[derive(Clone, Debug)]
pub struct Traits<Id> {
    pub config: MetabolicConfig,
    species: HashMap<Id, Species>,
}

impl<Id: SpeciesKey> Traits<Id> {
    pub fn new(config: MetabolicConfig) -> Self {
        Traits {
            config,
            species: HashMap::new(),
        }
    }

    pub fn get(&self, id: &Id) -> Option<&Species> {
        self.species.get(id)
    }

    pub fn contains(&self, id: &Id) -> bool {
        self.species.contains_key(id)
    }

    pub fn insert(&mut self, id: Id, is_producer: bool) {
        let species = self.config.new_species(is_producer);
        self.species.insert(id, species);
    }

    pub fn remove(&mut self, id: &Id) -> Option<Species> {
        self.species.remove(id)
    }

    fn species_mut(&mut self, id: &Id) -> ModelResult<&mut Species> {
        self.species
            .get_mut(id)
            .ok_or_else(|| ModelError::unknown_species(id))
    }

    pub fn set_body_size(&mut self, id: &Id, size_normalised: f64) -> ModelResult<()> {
        let config = self.config.clone();
        let s = self.species_mut(id)?;
        s.body_size = config.body_size(size_normalised);
        s.metabolism = config.metabolism(s.body_size, s.is_producer);
        Ok(())
    }

    pub fn set_interference(&mut self, id: &Id, greed_normalised: f64) -> ModelResult<()> {
        let interference = self.config.interference(greed_normalised);
        self.species_mut(id)?.interference = interference;
        Ok(())
    }

    pub fn set_is_producer(&mut self, id: &Id, is_producer: bool) -> ModelResult<()> {
        let config = self.config.clone();
        let s = self.species_mut(id)?;
        s.is_producer = is_producer;
        s.metabolism = config.metabolism(s.body_size, is_producer);
        s.efficiency = config.efficiency(is_producer);
        Ok(())
    }
}

impl<Id: SpeciesKey> SpeciesParams<Id> for Traits<Id> {
    fn growth(&self, species: &Id) -> f64 {
        self.get(species).map_or(f64::NAN, |s| s.metabolism)
    }

    fn self_limitation(&self, species: &Id) -> f64 {
        self.get(species).map_or(f64::NAN, |s| s.interference)
    }

    fn attack_rate(&self, resource: &Id, consumer: &Id) -> ModelResult<f64> {
        if resource == consumer {
            return Err(ModelError::self_interaction(resource));
        }
        let res = self
            .get(resource)
            .ok_or_else(|| ModelError::unknown_species(resource))?;
        let con = self
            .get(consumer)
            .ok_or_else(|| ModelError::unknown_species(consumer))?;
        self.config
            .foraging(res, con)
            .ok_or_else(|| ModelError::invalid_foraging(resource, consumer))
    }

    // only depends on what is being eaten
    fn efficiency(&self, resource: &Id, _consumer: &Id) -> f64 {
        self.get(resource).map_or(f64::NAN, |s| s.efficiency)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() <= 1e-12 * a.abs().max(b.abs())
    }

    #[test]
    fn traits_feed_the_engine() {
        let mut traits = Traits::new(MetabolicConfig::default());
        traits.insert("grass", true);
        traits.insert("rabbit", false);

        assert!(traits.growth(&"grass") > 0.0);
        assert!(traits.growth(&"rabbit") < 0.0);
        assert!(traits.self_limitation(&"grass") < 0.0);
        assert_eq!(traits.efficiency(&"grass", &"rabbit"), 0.2);
        assert_eq!(traits.efficiency(&"rabbit", &"grass"), 0.5);
        assert!(traits.attack_rate(&"grass", &"rabbit").unwrap() > 0.0);
        assert_eq!(
            traits.attack_rate(&"rabbit", &"grass"),
            Err(ModelError::invalid_foraging(&"rabbit", &"grass"))
        );
        assert_eq!(
            traits.attack_rate(&"rabbit", &"rabbit"),
            Err(ModelError::self_interaction(&"rabbit"))
        );
        assert_eq!(
            traits.attack_rate(&"fox", &"rabbit"),
            Err(ModelError::unknown_species(&"fox"))
        );
    }

    #[test]
    fn setters_recompute_derived_values() {
        let mut traits = Traits::new(MetabolicConfig::default());
        traits.insert(1u32, false);

        traits.set_body_size(&1, 1.0).unwrap();
        let s = traits.get(&1).unwrap().clone();
        assert!(close(s.body_size, 1e3));
        assert!(close(s.metabolism, -(1e3f64.powf(-0.25)) * 4.15e-8));

        traits.set_is_producer(&1, true).unwrap();
        let s = traits.get(&1).unwrap();
        assert!(s.metabolism > 0.0);
        assert_eq!(s.efficiency, 0.2);

        traits.set_interference(&1, 0.0).unwrap();
        assert!(close(traits.get(&1).unwrap().interference, -1e-5));

        assert_eq!(traits.set_body_size(&2, 0.5), Err(ModelError::unknown_species(&2)));
    }
}
