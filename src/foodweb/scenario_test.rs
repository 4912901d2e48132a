//! End-to-end food-web scenarios through the public `FoodWeb` surface.
//!
//! Inline tests run the solve on the calling thread; the background ones go
//! through tokio's blocking pool and must give the same answers.

#[cfg(test)]
mod tests {
    use crate::core::config::{ExecutionMode, FoodWebConfig};
    use crate::core::error::ModelError;
    use crate::foodweb::{FoodWeb, Notification, NotificationLog, SolveState};

    const GRASS: u32 = 0;
    const RABBIT: u32 = 1;
    const FOX: u32 = 2;

    fn inline_web() -> FoodWeb<u32> {
        FoodWeb::new(FoodWebConfig::default().with_execution(ExecutionMode::Inline))
    }

    fn background_web() -> FoodWeb<u32> {
        FoodWeb::new(FoodWebConfig::default().with_execution(ExecutionMode::Background))
    }

    fn logged(web: &mut FoodWeb<u32>) -> NotificationLog<u32> {
        let log = NotificationLog::new();
        web.observe(Box::new(log.fork()));
        log
    }

    fn grass_and_rabbit(web: &mut FoodWeb<u32>) {
        web.add_species(GRASS, true).unwrap();
        web.add_species(RABBIT, false).unwrap();
        web.add_interaction(&GRASS, &RABBIT).unwrap();
    }

    #[test]
    fn empty_web_is_trivially_fine() {
        let mut web = inline_web();
        web.trigger_solve();
        let report = web.update().unwrap().unwrap();
        assert!(report.feasible && report.stable);
        assert_eq!(report.raw_total_flux, 0.0);
        assert_eq!(report.richness, 0);
    }

    #[test]
    fn lone_producer_is_reported_alive() {
        let mut web = inline_web();
        let log = logged(&mut web);
        web.add_species(GRASS, true).unwrap();

        let report = web.update().unwrap().unwrap();
        assert!(report.feasible);
        assert!(report.stable);
        assert!(report.endangered.is_empty());
        assert_eq!(report.rescued, vec![GRASS]);

        let score = web.normalized_abundance(&GRASS).unwrap();
        assert!(score > 0.0 && score < 1.0, "score {}", score);
        assert!(web.feasible() && web.stable());
        assert!(matches!(
            log.snapshot().as_slice(),
            [Notification::Rescued(GRASS), Notification::Equilibrium(_)]
        ));

        // still positive: nothing more per species
        web.set_interference(&GRASS, 0.8).unwrap();
        let report = web.update().unwrap().unwrap();
        assert!(report.rescued.is_empty());
        assert_eq!(log.rescued(), vec![GRASS]);
    }

    #[test]
    fn grazing_pair_is_feasible_and_stable() {
        let mut web = inline_web();
        grass_and_rabbit(&mut web);

        let report = web.update().unwrap().unwrap();
        assert!(report.feasible);
        assert!(report.stable);
        assert!(web.abundance(&GRASS).unwrap() > web.abundance(&RABBIT).unwrap());

        let flux = web.normalized_flux(&GRASS, &RABBIT).unwrap();
        assert!(flux > 0.0 && flux < 1.0, "flux {}", flux);
        assert_eq!(web.normalized_flux(&RABBIT, &GRASS).unwrap(), 0.0);
        assert_eq!(report.total_flux, web.normalized_total_flux());

        let complexity = web.normalized_complexity();
        assert!(complexity > 0.0 && complexity < 1.0, "complexity {}", complexity);
        assert!(web.complexity_description().starts_with("S=2 L=1"));
    }

    #[test]
    fn consumer_sign_flips_fire_once_each() {
        let mut web = inline_web();
        let log = logged(&mut web);

        // nothing to eat
        web.add_species(RABBIT, false).unwrap();
        let report = web.update().unwrap().unwrap();
        assert!(!report.feasible);
        assert_eq!(report.endangered, vec![RABBIT]);
        assert!(web.normalized_abundance(&RABBIT).unwrap() < 0.0);

        // same sign again: silent
        web.set_body_size(&RABBIT, 0.3).unwrap();
        let report = web.update().unwrap().unwrap();
        assert!(report.endangered.is_empty() && report.rescued.is_empty());

        web.set_is_producer(&RABBIT, true).unwrap();
        let report = web.update().unwrap().unwrap();
        assert_eq!(report.rescued, vec![RABBIT]);

        web.set_is_producer(&RABBIT, false).unwrap();
        let report = web.update().unwrap().unwrap();
        assert_eq!(report.endangered, vec![RABBIT]);

        assert_eq!(log.endangered(), vec![RABBIT, RABBIT]);
        assert_eq!(log.rescued(), vec![RABBIT]);
        assert_eq!(log.reports().len(), 4);
    }

    #[test]
    fn species_events_precede_the_equilibrium_notification() {
        let mut web = inline_web();
        let log = logged(&mut web);
        web.add_species(FOX, false).unwrap();
        web.update();

        let notifications = log.snapshot();
        assert!(matches!(notifications[0], Notification::Endangered(FOX)));
        assert!(matches!(notifications[1], Notification::Equilibrium(_)));
    }

    #[test]
    fn contract_violations_are_rejected() {
        let mut web = inline_web();
        grass_and_rabbit(&mut web);
        web.add_species(FOX, false).unwrap();

        assert_eq!(
            web.add_species(GRASS, true),
            Err(ModelError::duplicate_species(&GRASS))
        );
        assert_eq!(
            web.add_interaction(&FOX, &FOX),
            Err(ModelError::self_interaction(&FOX))
        );
        assert_eq!(
            web.add_interaction(&RABBIT, &GRASS),
            Err(ModelError::invalid_foraging(&RABBIT, &GRASS))
        );
        assert_eq!(
            web.add_interaction(&GRASS, &RABBIT),
            Err(ModelError::duplicate_interaction(&GRASS, &RABBIT))
        );
        assert_eq!(
            web.remove_interaction(&RABBIT, &FOX),
            Err(ModelError::unknown_interaction(&RABBIT, &FOX))
        );
        assert_eq!(
            web.set_is_producer(&RABBIT, true),
            Err(ModelError::invalid_foraging(&GRASS, &RABBIT))
        );
        assert_eq!(
            web.add_interaction(&GRASS, &99),
            Err(ModelError::unknown_species(&99))
        );

        // a predator may also prey on another consumer
        web.add_interaction(&RABBIT, &FOX).unwrap();
        assert!(web.update().unwrap().is_ok());
    }

    #[test]
    fn attached_adjacency_replaces_own_links() {
        let mut web = inline_web();
        web.add_species(GRASS, true).unwrap();
        web.add_species(RABBIT, false).unwrap();

        web.attach_adjacency(Box::new(|res: &u32| {
            if *res == GRASS {
                vec![RABBIT]
            } else {
                Vec::new()
            }
        }));
        let report = web.update().unwrap().unwrap();
        assert!(report.feasible);
        assert!(report.raw_total_flux > 0.0);

        web.detach_adjacency();
        let report = web.update().unwrap().unwrap();
        assert!(!report.feasible);
        assert_eq!(report.raw_total_flux, 0.0);
    }

    #[test]
    fn bad_external_graph_fails_the_solve_without_wedging() {
        let mut web = inline_web();
        let log = logged(&mut web);
        web.add_species(GRASS, true).unwrap();
        web.add_species(RABBIT, false).unwrap();

        web.attach_adjacency(Box::new(|_: &u32| vec![42]));
        let outcome = web.update().unwrap();
        assert_eq!(outcome, Err(ModelError::unknown_species(&42)));
        assert_eq!(web.state(), SolveState::Clean);
        assert!(!web.is_calculating());

        // a producer presented as a consumer
        web.attach_adjacency(Box::new(|res: &u32| {
            if *res == RABBIT {
                vec![GRASS]
            } else {
                Vec::new()
            }
        }));
        let outcome = web.update().unwrap();
        assert_eq!(outcome, Err(ModelError::invalid_foraging(&RABBIT, &GRASS)));
        assert!(log
            .snapshot()
            .iter()
            .all(|n| matches!(n, Notification::SolveFailed(_))));

        web.detach_adjacency();
        assert!(web.update().unwrap().is_ok());
    }

    #[test]
    fn external_self_loop_fails_the_solve() {
        let mut web = inline_web();
        let log = logged(&mut web);
        web.add_species(GRASS, true).unwrap();
        web.add_species(RABBIT, false).unwrap();

        // grass and rabbits both eaten by rabbits
        web.attach_adjacency(Box::new(|_: &u32| vec![RABBIT]));
        let outcome = web.update().unwrap();
        assert_eq!(outcome, Err(ModelError::self_interaction(&RABBIT)));
        assert_eq!(web.state(), SolveState::Clean);
        assert!(log.reports().is_empty());
        assert!(!web.feasible());
    }

    #[test]
    fn external_graph_listing_a_consumer_twice_fails_the_solve() {
        let mut web = inline_web();
        web.add_species(GRASS, true).unwrap();
        web.add_species(RABBIT, false).unwrap();

        web.attach_adjacency(Box::new(|res: &u32| {
            if *res == GRASS {
                vec![RABBIT, RABBIT]
            } else {
                Vec::new()
            }
        }));
        let outcome = web.update().unwrap();
        assert_eq!(outcome, Err(ModelError::duplicate_interaction(&GRASS, &RABBIT)));
        assert_eq!(web.state(), SolveState::Clean);

        web.detach_adjacency();
        web.add_interaction(&GRASS, &RABBIT).unwrap();
        let report = web.update().unwrap().unwrap();
        assert!(report.feasible);
    }

    #[test]
    fn background_solve_is_collected() {
        let mut web = background_web();
        grass_and_rabbit(&mut web);

        let report = web.equilibrate_blocking().unwrap().unwrap();
        assert!(report.feasible && report.stable);
        assert_eq!(web.state(), SolveState::Clean);
        assert_eq!(web.solves_dispatched(), 1);
        assert!(web.equilibrate_blocking().is_none());
    }

    #[test]
    fn edits_during_a_solve_coalesce() {
        let mut background = background_web();
        let mut inline = inline_web();
        for web in [&mut background, &mut inline] {
            grass_and_rabbit(web);
        }

        background.update();
        for step in 0..10 {
            background.set_body_size(&RABBIT, step as f64 / 10.0).unwrap();
        }
        background.equilibrate_blocking();
        assert_eq!(background.solves_dispatched(), 2);
        assert_eq!(background.state(), SolveState::Clean);

        inline.set_body_size(&RABBIT, 0.9).unwrap();
        inline.update();
        assert_eq!(
            background.abundance(&RABBIT).unwrap(),
            inline.abundance(&RABBIT).unwrap()
        );
    }

    #[test]
    fn removal_during_a_solve_is_not_reported() {
        let mut web = background_web();
        web.add_species(RABBIT, false).unwrap();
        web.add_species(FOX, false).unwrap();
        web.update();
        web.remove_species(&FOX).unwrap();

        let report = web.equilibrate_blocking().unwrap().unwrap();
        assert_eq!(report.richness, 1);
        assert_eq!(web.abundance(&FOX), Err(ModelError::unknown_species(&FOX)));
        assert!(web.abundance(&RABBIT).unwrap() < 0.0);
    }

    #[tokio::test]
    async fn equilibrate_on_ambient_runtime() {
        let mut web = background_web();
        grass_and_rabbit(&mut web);

        let report = web.equilibrate().await.unwrap().unwrap();
        assert!(report.feasible);
        assert!(!web.is_calculating());
        assert!(web.equilibrate().await.is_none());
    }
}
