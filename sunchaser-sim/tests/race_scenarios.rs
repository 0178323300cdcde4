//! End-to-end races driven tick by tick through the public API.

use chrono::{NaiveDate, NaiveDateTime};
use sunchaser_sim::units::{meters_to_miles, mph_to_mps};
use sunchaser_sim::{
    CarConfig, Command, EndKind, Geometry, Leg, LegKind, LegWeather, RaceEnv, Route, Series1,
    StepSeries,
};

const TICK_LIMIT: usize = 50_000;

fn car() -> CarConfig {
    CarConfig {
        name: "scenario car".to_string(),
        max_watthours: 5_000.0,
        mass: 300.0,
        drag_coeff: 0.15,
        friction_coeff: 20.0,
        accel_coeff: 350.0,
        max_motor_output_power: 10_000.0,
        max_motor_input_power: -10_000.0,
        array_multiplier: 4.0,
        min_mph: 5.0,
        max_mph: 70.0,
        max_accel: 0.5,
        max_decel: -0.5,
    }
}

fn day(d: u32, hour: u32, minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 7, d)
        .expect("date")
        .and_hms_opt(hour, minute, 0)
        .expect("time")
}

#[allow(clippy::too_many_arguments)]
fn leg(
    name: &str,
    kind: LegKind,
    end: EndKind,
    length: f64,
    start: NaiveDateTime,
    open: NaiveDateTime,
    close: NaiveDateTime,
    sun: f64,
) -> Leg {
    let dists = vec![0.0, length];
    let geometry = Geometry {
        longitude: Series1::linear(dists.clone(), vec![-86.0, -86.5]).expect("series"),
        latitude: Series1::linear(dists.clone(), vec![39.8, 40.0]).expect("series"),
        slope: Series1::linear(dists.clone(), vec![0.0, 0.0]).expect("series"),
        altitude: Series1::linear(dists.clone(), vec![220.0, 220.0]).expect("series"),
        heading: Series1::nearest(dists, vec![270.0, 270.0]).expect("series"),
    };
    let limits = StepSeries::new(vec![0.0], vec![mph_to_mps(60.0)]).expect("limits");
    let mut leg = Leg::new(
        name.to_string(),
        kind,
        end,
        length,
        geometry,
        vec![],
        limits,
        start,
        open,
        close,
    )
    .expect("leg");
    let weather = LegWeather::uniform(length, day(1, 0, 0), day(5, 23, 0), 0.0, sun, sun)
        .expect("weather");
    leg.attach_weather(weather).expect("attach");
    leg
}

fn cruise(target_mph: f64, try_loop: bool) -> Command {
    Command {
        target_mph,
        accel: 0.5,
        decel: -0.5,
        try_loop,
    }
}

/// Run until the race reports done, enforcing energy bounds every tick.
fn run_to_finish(env: &mut RaceEnv, mut command: impl FnMut(&RaceEnv) -> Command) {
    let capacity = env.car().capacity_joules();
    for _ in 0..TICK_LIMIT {
        let cmd = command(env);
        let done = env.step(Some(cmd)).expect("step");
        let energy = env.state().energy;
        assert!((0.0..=capacity + 1e-6).contains(&energy));
        if done {
            return;
        }
    }
    panic!("race did not finish within {TICK_LIMIT} ticks");
}

#[test]
fn two_stage_route_completes_and_banks_all_miles() {
    let mut route = Route::new();
    route.push_leg(leg(
        "stage one",
        LegKind::Base,
        EndKind::Checkpoint,
        3_000.0,
        day(1, 9, 0),
        day(1, 9, 0),
        day(1, 18, 0),
        800.0,
    ));
    route.push_leg(leg(
        "stage two",
        LegKind::Base,
        EndKind::StageStop,
        3_000.0,
        day(1, 9, 0),
        day(1, 9, 0),
        day(1, 18, 0),
        800.0,
    ));
    let mut env = RaceEnv::new(car(), route).expect("env");

    run_to_finish(&mut env, |_| cruise(35.0, false));

    assert!(env.done());
    assert_eq!(env.state().legs_completed, vec!["stage one", "stage two"]);
    assert!((env.miles_earned() - meters_to_miles(6_000.0)).abs() < 1e-9);
    assert_eq!(env.telemetry().legs_attempted(), vec!["stage one", "stage two"]);

    // The terminal state is frozen; further ticks change nothing.
    let frozen = env.state().clone();
    for _ in 0..3 {
        assert!(env.step(None).expect("step"));
    }
    assert_eq!(env.state(), &frozen);
}

#[test]
fn infeasible_stage_close_forfeits_everything() {
    let mut route = Route::new();
    route.push_leg(leg(
        "stage one",
        LegKind::Base,
        EndKind::StageStop,
        3_000.0,
        day(1, 9, 0),
        day(1, 9, 0),
        day(1, 9, 1),
        800.0,
    ));
    route.push_leg(leg(
        "stage two",
        LegKind::Base,
        EndKind::StageStop,
        3_000.0,
        day(2, 9, 0),
        day(2, 9, 0),
        day(2, 18, 0),
        800.0,
    ));
    let mut env = RaceEnv::new(car(), route).expect("env");

    run_to_finish(&mut env, |_| cruise(35.0, false));

    assert!(env.done());
    assert_eq!(env.miles_earned(), 0.0);
    assert!(env.state().legs_completed.is_empty());
}

#[test]
fn requested_loop_is_driven_and_redone_once() {
    let mut route = Route::new();
    route.push_leg(leg(
        "stage one",
        LegKind::Base,
        EndKind::Checkpoint,
        3_000.0,
        day(1, 9, 0),
        day(1, 9, 0),
        day(1, 18, 0),
        800.0,
    ));
    route.push_leg(leg(
        "big loop",
        LegKind::Loop,
        EndKind::Checkpoint,
        2_000.0,
        day(1, 9, 0),
        day(1, 9, 0),
        day(1, 18, 0),
        800.0,
    ));
    route.push_leg(leg(
        "stage two",
        LegKind::Base,
        EndKind::StageStop,
        3_000.0,
        day(1, 9, 0),
        day(1, 9, 0),
        day(1, 18, 0),
        800.0,
    ));
    let mut env = RaceEnv::new(car(), route).expect("env");

    // Ask for the loop until it has been banked once. The tick that
    // crosses the loop's finish still carries try_loop, so the loop is
    // driven exactly twice before the request drops.
    run_to_finish(&mut env, |env| {
        let want_loop = !env
            .state()
            .legs_completed
            .iter()
            .any(|name| name == "big loop");
        cruise(35.0, want_loop)
    });

    assert!(env.done());
    assert_eq!(
        env.state().legs_completed,
        vec!["stage one", "big loop", "big loop", "stage two"]
    );
    let expected = meters_to_miles(3_000.0 + 2_000.0 + 2_000.0 + 3_000.0);
    assert!((env.miles_earned() - expected).abs() < 1e-9);
    // Telemetry shows four attempts in race order.
    assert_eq!(
        env.telemetry().legs_attempted(),
        vec!["stage one", "big loop", "big loop", "stage two"]
    );
}

#[test]
fn long_stage_rolls_over_to_the_next_morning() {
    let mut route = Route::new();
    route.push_leg(leg(
        "transcontinental",
        LegKind::Base,
        EndKind::StageStop,
        600_000.0,
        day(1, 9, 0),
        day(1, 9, 0),
        day(3, 18, 0),
        800.0,
    ));
    let mut env = RaceEnv::new(car(), route).expect("env");

    let mut saw_day_two = false;
    let capacity = env.car().capacity_joules();
    for _ in 0..TICK_LIMIT {
        let done = env.step(Some(cruise(35.0, false))).expect("step");
        assert!((0.0..=capacity + 1e-6).contains(&env.state().energy));
        if env.time().date() == day(2, 0, 0).date() {
            saw_day_two = true;
        }
        if done {
            break;
        }
    }

    assert!(env.done());
    assert!(saw_day_two, "race should have crossed into day two");
    assert!((env.miles_earned() - meters_to_miles(600_000.0)).abs() < 1e-9);
    // The overnight jump resumes driving at the 09:00 release.
    let times: Vec<_> = env.telemetry().attempts()[0]
        .ticks
        .iter()
        .map(|t| t.time)
        .collect();
    assert!(times.windows(2).all(|pair| pair[0] <= pair[1]));
}

#[test]
fn telemetry_replays_the_commands_that_were_issued() {
    let mut route = Route::new();
    route.push_leg(leg(
        "stage one",
        LegKind::Base,
        EndKind::StageStop,
        3_000.0,
        day(1, 9, 0),
        day(1, 9, 0),
        day(1, 18, 0),
        800.0,
    ));
    let mut env = RaceEnv::new(car(), route).expect("env");
    run_to_finish(&mut env, |_| cruise(42.0, false));

    let log = env.into_telemetry();
    let commands = log.commands();
    assert!(!commands.is_empty());
    assert!(commands.iter().all(|c| (c.target_mph - 42.0).abs() < 1e-12));

    // The log round-trips through JSON intact.
    let json = log.to_json().expect("serialize");
    let restored = sunchaser_sim::TelemetryLog::from_json(&json).expect("parse");
    assert_eq!(restored.commands().len(), commands.len());
    assert!(restored.average_mph() > 0.0);
}
