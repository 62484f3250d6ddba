//! Keyframe timelines driven by the audio clock

use crate::playback::tick::{TickContext, TickSubscriber};

/// Value that becomes active at a position
#[derive(Debug, Clone, PartialEq)]
pub struct Keyframe<T> {
    /// Position (seconds or progress) from which the value applies
    pub at: f64,
    /// Value carried by the keyframe
    pub value: T,
}

impl<T> Keyframe<T> {
    /// Create a keyframe
    pub fn new(at: f64, value: T) -> Self {
        Self { at, value }
    }
}

type KeyframeCallback<T> = Box<dyn FnMut(&T)>;

/// Sorted keyframes plus a callback fired when the active keyframe changes
pub struct Timeline<T> {
    keyframes: Vec<Keyframe<T>>,
    active: Option<usize>,
    callback: KeyframeCallback<T>,
}

impl<T: std::fmt::Debug> std::fmt::Debug for Timeline<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Timeline")
            .field("keyframes", &self.keyframes)
            .field("active", &self.active)
            .finish_non_exhaustive()
    }
}

impl<T> Timeline<T> {
    /// Build a timeline; keyframes may come in any order
    pub fn new(mut keyframes: Vec<Keyframe<T>>, callback: impl FnMut(&T) + 'static) -> Self {
        keyframes.sort_by(|a, b| a.at.total_cmp(&b.at));
        Self {
            keyframes,
            active: None,
            callback: Box::new(callback),
        }
    }

    /// Move to `position`; returns true if a new keyframe became active
    ///
    /// Before the first keyframe nothing is active and the callback stays quiet.
    pub fn tick(&mut self, position: f64) -> bool {
        let passed = self.keyframes.partition_point(|k| k.at <= position);
        let active = passed.checked_sub(1);
        if active == self.active {
            return false;
        }
        self.active = active;
        match active {
            Some(index) => {
                (self.callback)(&self.keyframes[index].value);
                true
            }
            None => false,
        }
    }

    /// Currently active value
    pub fn active(&self) -> Option<&T> {
        self.active.map(|index| &self.keyframes[index].value)
    }

    /// Keyframes in position order
    pub fn keyframes(&self) -> &[Keyframe<T>] {
        &self.keyframes
    }
}

/// Which audio reading feeds a timeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimelineSource {
    /// Track progress, 0..1
    #[default]
    Progress,
    /// Track time in seconds
    Time,
}

/// Timeline ticked from the audio clock
#[derive(Debug)]
pub struct AudioTimeline<T> {
    source: TimelineSource,
    timeline: Timeline<T>,
}

impl<T> AudioTimeline<T> {
    /// Drive `timeline` from `source`
    pub fn new(source: TimelineSource, timeline: Timeline<T>) -> Self {
        Self { source, timeline }
    }

    /// Reading this timeline follows
    pub fn source(&self) -> TimelineSource {
        self.source
    }

    /// Underlying timeline
    pub fn timeline(&self) -> &Timeline<T> {
        &self.timeline
    }
}

impl<T> TickSubscriber for AudioTimeline<T> {
    fn tick(&mut self, ctx: &mut TickContext<'_>) {
        let position = match self.source {
            TimelineSource::Progress => ctx.audio.progress,
            TimelineSource::Time => ctx.audio.time,
        };
        if self.timeline.tick(position) {
            log::debug!("Timeline keyframe changed at {:.3}", position);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::{AudioClock, TickDispatcher};
    use crate::render::SceneResources;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn recording_timeline(fired: &Rc<RefCell<Vec<&'static str>>>) -> Timeline<&'static str> {
        let sink = Rc::clone(fired);
        Timeline::new(
            vec![
                Keyframe::new(0.5, "chorus"),
                Keyframe::new(0.0, "intro"),
                Keyframe::new(0.9, "outro"),
            ],
            move |value| sink.borrow_mut().push(*value),
        )
    }

    #[test]
    fn test_callback_fires_on_change_only() {
        let fired = Rc::new(RefCell::new(Vec::new()));
        let mut timeline = recording_timeline(&fired);

        assert!(timeline.tick(0.1));
        assert!(!timeline.tick(0.2));
        assert!(timeline.tick(0.6));
        assert!(timeline.tick(0.3));

        assert_eq!(*fired.borrow(), vec!["intro", "chorus", "intro"]);
        assert_eq!(timeline.active(), Some(&"intro"));
    }

    #[test]
    fn test_nothing_active_before_first_keyframe() {
        let fired = Rc::new(RefCell::new(Vec::new()));
        let mut timeline = recording_timeline(&fired);
        assert!(!timeline.tick(-1.0));
        assert_eq!(timeline.active(), None);
        assert!(fired.borrow().is_empty());

        // Leaving the keyframes backwards deactivates without a callback
        assert!(timeline.tick(0.0));
        assert!(!timeline.tick(-0.5));
        assert_eq!(timeline.active(), None);
        assert_eq!(fired.borrow().len(), 1);
    }

    #[test]
    fn test_audio_timeline_follows_selected_source() {
        let fired = Rc::new(RefCell::new(Vec::new()));
        let by_time = Rc::new(RefCell::new(AudioTimeline::new(
            TimelineSource::Time,
            recording_timeline(&fired),
        )));
        let mut dispatcher = TickDispatcher::new();
        let handle = dispatcher.subscribe(Rc::clone(&by_time));
        let mut resources = SceneResources::allocate(1, 1, &[]);

        // Time 0.95 s selects the outro even though progress is low
        dispatcher.dispatch(AudioClock::new(0.95, 0.01, 20.0), &mut resources, false);
        assert_eq!(*fired.borrow(), vec!["outro"]);

        dispatcher.unsubscribe(handle);
        dispatcher.dispatch(AudioClock::new(0.1, 0.0, 20.0), &mut resources, false);
        assert_eq!(fired.borrow().len(), 1);
        assert_eq!(by_time.borrow().source(), TimelineSource::Time);
    }
}
