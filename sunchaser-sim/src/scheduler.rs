//! Leg-transition logic: what happens when a leg's finish line is crossed.
//!
//! Called by the engine exactly once per completion. Decides scoring,
//! hold-time charging at controls, loop attempts and retries, stage-stop
//! overnights, and race termination. Time only ever moves forward here;
//! charging advances the clock as a side effect.

use chrono::{Duration, NaiveDateTime};
use log::info;

use crate::constants::{
    CHECKPOINT_HOLD_MINUTES, EVENING_CHARGE_HOURS, LOOP_HOLD_MINUTES, LOOP_RETRY_CHARGE_MINUTES,
    MORNING_CHARGE_HOURS,
};
use crate::engine::{RaceEnv, next_morning};
use crate::route::{EndKind, LegKind, Route};
use crate::units::meters_to_miles;

/// Copy of the finished leg's scheduling fields, taken up front so the
/// environment can be mutated freely afterwards.
struct LegMeta {
    name: String,
    kind: LegKind,
    end: EndKind,
    length: f64,
    open: NaiveDateTime,
    close: NaiveDateTime,
}

pub(crate) fn on_leg_finish(env: &mut RaceEnv) {
    let idx = env.state.leg_index;
    let leg = {
        let current = &env.route.legs()[idx];
        LegMeta {
            name: current.name.clone(),
            kind: current.kind,
            end: current.end,
            length: current.length,
            open: current.open,
            close: current.close,
        }
    };
    let arrival = env.state.time;

    // Scoring. Loops and stage legs must beat the close time; a base leg
    // into a checkpoint still banks its miles when late, the lost time is
    // its own penalty.
    if arrival > leg.close && (leg.kind == LegKind::Loop || leg.end == EndKind::StageStop) {
        info!("arrived after close, no miles for {:?}", leg.name);
    } else {
        let miles = meters_to_miles(leg.length);
        env.state.miles_earned += miles;
        env.state.legs_completed.push(leg.name.clone());
        info!("banked {miles:.1} miles for {:?}", leg.name);
    }

    let is_last = idx == env.route.len() - 1;

    // Finishing the route's final base leg ends the race outright, on time
    // or not.
    if is_last && leg.kind == LegKind::Base {
        info!("final base leg finished, route complete");
        env.state.done = true;
        return;
    }

    // Early arrival: sit on the array until the control opens.
    if env.state.time < leg.open {
        env.charge(leg.open - env.state.time);
    }

    let hold = if leg.kind == LegKind::Loop {
        Duration::minutes(LOOP_HOLD_MINUTES)
    } else {
        Duration::minutes(CHECKPOINT_HOLD_MINUTES)
    };

    match leg.end {
        EndKind::Checkpoint => finish_at_checkpoint(env, &leg, hold),
        EndKind::StageStop => finish_at_stage_stop(env, &leg, hold, is_last),
    }
}

/// First base leg at or after `from`, scanning forward in race order.
fn next_base_at_or_after(route: &Route, from: usize) -> Option<usize> {
    (from..route.len()).find(|&i| route.legs()[i].kind == LegKind::Base)
}

fn finish_at_checkpoint(env: &mut RaceEnv, leg: &LegMeta, hold: Duration) {
    // The mandatory hold doubles as charge time, truncated at close.
    env.charge((leg.close - env.state.time).min(hold));

    let next_index = env.state.leg_index + 1;
    // Route validation guarantees a checkpoint leg is never last.
    let next_is_loop = env.route.leg(next_index).map(|l| l.kind) == Some(LegKind::Loop);

    if env.state.time < leg.close {
        if env.state.try_loop && (leg.kind == LegKind::Loop || next_is_loop) {
            if leg.kind == LegKind::Loop {
                info!("redoing loop {:?} at {}", leg.name, env.state.time);
            } else {
                info!("starting loop at {}", env.state.time);
                env.state.leg_index = next_index;
            }
            return;
        }
        // Declining the loop: skip ahead to the next base leg and wait for
        // its release time.
        match next_base_at_or_after(&env.route, next_index) {
            Some(base_idx) => {
                let release = env.route.legs()[base_idx].start;
                env.charge(release - env.state.time);
                env.state.leg_index = base_idx;
                info!("released onto base leg at {}", env.state.time);
            }
            None => {
                info!("no base leg remains after the checkpoint, race over");
                env.state.done = true;
            }
        }
        return;
    }

    // The checkpoint closed during the hold; any loop here is off the
    // table, move on to the next base leg.
    let from = if next_is_loop { next_index + 1 } else { next_index };
    match next_base_at_or_after(&env.route, from) {
        Some(base_idx) => {
            env.state.leg_index = base_idx;
            info!("checkpoint closed, moving onto base leg at {}", env.state.time);
        }
        None => {
            info!("checkpoint closed with no base leg remaining, race over");
            env.state.done = true;
        }
    }
}

fn finish_at_stage_stop(env: &mut RaceEnv, leg: &LegMeta, hold: Duration, is_last: bool) {
    if env.state.time >= leg.close {
        // A base leg missing its stage close means the car gets trailered:
        // the race ends and every banked mile is forfeit.
        if leg.kind == LegKind::Base {
            info!("missed the stage close, trailered; miles forfeited");
            env.state.miles_earned = 0.0;
            env.state.done = true;
            return;
        }
        if is_last {
            info!("final loop arrived after close, race over");
            env.state.done = true;
            return;
        }
        // A late loop just doesn't count. Charge out the remaining evening
        // window, then jump to the next leg's release minus its morning
        // charge.
        let next_index = env.state.leg_index + 1;
        env.charge((leg.close - env.state.time) + Duration::hours(EVENING_CHARGE_HOURS));
        let next_start = env.route.legs()[next_index].start;
        env.state.time = next_start - Duration::hours(MORNING_CHARGE_HOURS);
        env.charge(Duration::hours(MORNING_CHARGE_HOURS));
        env.state.leg_index = next_index;
        return;
    }

    env.charge((leg.close - env.state.time).min(hold));

    if env.state.time < leg.close {
        if env.state.try_loop && leg.kind == LegKind::Loop {
            info!("redoing loop {:?} after a top-up charge", leg.name);
            env.charge(Duration::minutes(LOOP_RETRY_CHARGE_MINUTES));
            return;
        }
        if is_last {
            // A final loop with no retry requested: charge out the day and
            // call the race.
            info!("final loop finished, no retry; race over");
            env.charge(leg.close - env.state.time);
            env.charge(Duration::hours(EVENING_CHARGE_HOURS));
            env.state.done = true;
            return;
        }
        let next_index = env.state.leg_index + 1;
        let next_is_loop = env.route.leg(next_index).map(|l| l.kind) == Some(LegKind::Loop);
        if env.state.try_loop && next_is_loop {
            info!("starting loop after a top-up charge");
            env.charge(Duration::minutes(LOOP_RETRY_CHARGE_MINUTES));
            env.state.leg_index = next_index;
            return;
        }
        // Nothing left to drive today; charge until the stage closes.
        env.charge(leg.close - env.state.time);
    }

    // The stage is closed now; set up tomorrow's leg and take the
    // overnight charge windows.
    if is_last {
        info!("final stage closed, race over");
        env.state.done = true;
        return;
    }
    let next_index = env.state.leg_index + 1;
    let next_is_loop = env.route.leg(next_index).map(|l| l.kind) == Some(LegKind::Loop);
    if env.state.try_loop && next_is_loop {
        info!("holding overnight for the loop");
        env.state.leg_index = next_index;
    } else {
        match next_base_at_or_after(&env.route, next_index) {
            Some(base_idx) => {
                info!("holding overnight for the next base leg");
                env.state.leg_index = base_idx;
            }
            None => {
                info!("no base leg remains, race over");
                env.state.done = true;
                return;
            }
        }
    }
    env.charge(Duration::hours(EVENING_CHARGE_HOURS));
    env.state.time = next_morning(env.state.time);
    env.charge(Duration::hours(MORNING_CHARGE_HOURS));
}
