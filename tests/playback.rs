use std::time::Duration;
use timeviz::playback::{PlaybackController, TimerId};

fn ms(v: u64) -> Duration {
    Duration::from_millis(v)
}

#[test]
fn any_sequence_of_commands_holds_at_most_one_timer() {
    let mut p = PlaybackController::new(6, ms(100));
    let mut now = Duration::ZERO;
    // cheap deterministic mix of commands
    let mut seed: u32 = 7;
    for _ in 0..500 {
        seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
        now += ms(u64::from(seed % 70));
        match (seed >> 16) % 8 {
            0 | 1 => {
                p.play(now);
            }
            2 => p.pause(),
            3 => {
                p.toggle(now);
            }
            4 => {
                p.scrub((seed % 9) as usize);
            }
            5 => {
                p.step(if seed & 1 == 0 { 1 } else { -1 });
            }
            6 => p.set_interval(ms(50 + u64::from(seed % 200)), now),
            _ => {
                p.poll(now);
            }
        }
        assert!(p.active_timers() <= 1);
        assert_eq!(p.active_timers() == 1, p.is_playing());
        assert!(p.index() <= p.last_index());
    }
}

#[test]
fn polling_never_fires_more_than_one_tick() {
    let mut p = PlaybackController::new(10, ms(100));
    p.play(ms(0));
    // a long stall delivers one step, not five
    assert_eq!(p.poll(ms(550)), Some(1));
    assert_eq!(p.poll(ms(551)), None);
    // next due half a period after the late tick at the earliest
    assert_eq!(p.poll(ms(599)), None);
    assert_eq!(p.poll(ms(600)), Some(2));
}

#[test]
fn stale_timer_ids_are_ignored() {
    let mut p = PlaybackController::new(5, ms(100));
    p.play(ms(0));
    let first = p.timer().map(|t| t.id).unwrap();
    p.pause();
    p.play(ms(10));
    let second = p.timer().map(|t| t.id).unwrap();
    assert_ne!(first, second);

    assert_eq!(p.on_timer(first, ms(200)), None);
    assert_eq!(p.index(), 0);
    assert_eq!(p.on_timer(second, ms(200)), Some(1));
    assert_eq!(p.on_timer(TimerId(9_999), ms(300)), None);
}

#[test]
fn single_step_datasets_cannot_play() {
    let mut p = PlaybackController::new(1, ms(100));
    assert_eq!(p.play(ms(0)), None);
    assert!(!p.is_playing());
    assert_eq!(p.active_timers(), 0);

    let mut empty = PlaybackController::new(0, ms(100));
    assert_eq!(empty.step(3), None);
    assert_eq!(empty.index(), 0);
}

#[test]
fn shrinking_the_dataset_clamps_the_index() {
    let mut p = PlaybackController::new(8, ms(100));
    p.scrub(7);
    p.set_len(3);
    assert_eq!(p.index(), 2);
    p.play(ms(0));
    assert_eq!(p.index(), 0);
    assert!(p.is_playing());
}
