//! FrameQueue behavior tests.

use avqueue::{FrameQueue, SeekRequest};

fn filled(timestamps: &[i64], watermark: usize) -> FrameQueue<&'static str> {
    let mut queue = FrameQueue::new(watermark);
    for &timestamp in timestamps {
        queue.push(timestamp, "frame");
    }
    queue
}

#[test]
fn pops_in_insertion_order() {
    let mut queue = filled(&[0, 1, 2], 10);
    assert_eq!(queue.front_timestamp(), Some(0));
    assert_eq!(queue.pop().map(|(timestamp, _)| timestamp), Some(0));
    assert_eq!(queue.pop().map(|(timestamp, _)| timestamp), Some(1));
    assert_eq!(queue.len(), 1);
    assert_eq!(queue.pop().map(|(timestamp, _)| timestamp), Some(2));
    assert!(queue.pop().is_none());
    assert!(queue.is_empty());
}

#[test]
fn watermark_is_soft() {
    let mut queue = filled(&[0, 1], 2);
    assert!(!queue.has_room());
    // Pushing past the watermark is never refused.
    queue.push(2, "overshoot");
    assert_eq!(queue.len(), 3);
    assert_eq!(queue.watermark(), 2);
}

#[test]
fn pop_before_returns_latest_stale_frame() {
    let mut queue = filled(&[0, 10, 20, 30], 10);
    let (timestamp, _) = queue.pop_before(25).expect("stale frames present");
    assert_eq!(timestamp, 20);
    assert_eq!(queue.front_timestamp(), Some(30));
    assert!(queue.pop_before(30).is_none());
    assert_eq!(queue.len(), 1);
}

#[test]
fn pop_up_to_is_bounded() {
    let mut queue = filled(&[0, 1, 2, 3, 4], 10);
    let popped: Vec<i64> = queue.pop_up_to(3).into_iter().map(|(t, _)| t).collect();
    assert_eq!(popped, vec![0, 1, 2]);
    assert_eq!(queue.pop_up_to(10).len(), 2);
    assert!(queue.pop_up_to(1).is_empty());
}

#[test]
fn clear_empties_and_restores_room() {
    let mut queue = filled(&[0, 1, 2], 3);
    assert!(!queue.has_room());
    queue.clear();
    assert!(queue.is_empty());
    assert!(queue.has_room());
    assert_eq!(queue.iter().count(), 0);
}

#[test]
fn newer_seek_request_replaces_older() {
    let mut request = SeekRequest::default();
    assert_eq!(request.pending(), None);
    request.set(5);
    request.set(0);
    assert_eq!(request.pending(), Some(0));
    assert_eq!(request.take(), Some(0));
    assert_eq!(request.take(), None);
}
