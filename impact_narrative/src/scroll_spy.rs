//! Section tracking for the page navigation.
//!
//! The tracker is the single writer of the active section. It is fed by
//! visibility events, each tagged with the subscription that produced it, and
//! the last event that reports a section entering the band wins. Navigation
//! requests only produce a scroll request; the active section changes once the
//! scroll brings the target into the band and an event reports it.

use log::debug;
use std::collections::HashSet;

use crate::config::Dataset;

#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
pub enum SectionId {
    Budgetary,
    Headcounts,
    Distributional,
    Poverty,
    Inequality,
    Constituency,
    Conclusion,
}

impl SectionId {
    pub const ALL: [SectionId; 7] = [
        SectionId::Budgetary,
        SectionId::Headcounts,
        SectionId::Distributional,
        SectionId::Poverty,
        SectionId::Inequality,
        SectionId::Constituency,
        SectionId::Conclusion,
    ];

    pub fn anchor(&self) -> &'static str {
        match self {
            SectionId::Budgetary => "budgetary",
            SectionId::Headcounts => "headcounts",
            SectionId::Distributional => "distributional",
            SectionId::Poverty => "poverty",
            SectionId::Inequality => "inequality",
            SectionId::Constituency => "constituency",
            SectionId::Conclusion => "conclusion",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            SectionId::Budgetary => "Budgetary impact",
            SectionId::Headcounts => "Who is affected",
            SectionId::Distributional => "Distributional impact",
            SectionId::Poverty => "Poverty",
            SectionId::Inequality => "Inequality",
            SectionId::Constituency => "Constituencies",
            SectionId::Conclusion => "Conclusion",
        }
    }

    pub fn for_dataset(dataset: Dataset) -> SectionId {
        match dataset {
            Dataset::Budgetary => SectionId::Budgetary,
            Dataset::Headcounts => SectionId::Headcounts,
            Dataset::Distributional => SectionId::Distributional,
            Dataset::Poverty => SectionId::Poverty,
            Dataset::Inequality => SectionId::Inequality,
            Dataset::Constituency => SectionId::Constituency,
        }
    }
}

/// The part of the viewport in which a section counts as "being read".
///
/// Insets are fractions of the viewport height, measured from the top and
/// from the bottom.
#[derive(PartialEq, Debug, Clone, Copy)]
pub struct VisibilityBand {
    pub top_inset: f64,
    pub bottom_inset: f64,
}

impl VisibilityBand {
    /// From 20% below the viewport top to 60% above the viewport bottom.
    pub const DEFAULT: VisibilityBand = VisibilityBand {
        top_inset: 0.2,
        bottom_inset: 0.6,
    };

    /// Start and end of the band, in pixels from the viewport top.
    pub fn window(&self, viewport_height: f64) -> (f64, f64) {
        (
            viewport_height * self.top_inset,
            viewport_height * (1.0 - self.bottom_inset),
        )
    }

    /// Whether an element spanning `top..bottom` (viewport coordinates)
    /// overlaps the band.
    pub fn intersects(&self, viewport_height: f64, top: f64, bottom: f64) -> bool {
        let (start, end) = self.window(viewport_height);
        top < end && bottom > start
    }

    /// The same band as a CSS root margin for the browser's observer.
    pub fn root_margin(&self) -> String {
        format!(
            "-{}% 0px -{}% 0px",
            (self.top_inset * 100.0).round(),
            (self.bottom_inset * 100.0).round()
        )
    }
}

impl Default for VisibilityBand {
    fn default() -> Self {
        VisibilityBand::DEFAULT
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub struct SubscriptionId(u64);

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub struct VisibilityEvent {
    pub subscription: SubscriptionId,
    pub section: SectionId,
    pub intersecting: bool,
}

/// Vertical extent of a rendered section, in document coordinates.
#[derive(PartialEq, Debug, Clone, Copy)]
pub struct SectionLayout {
    pub section: SectionId,
    pub top: f64,
    pub bottom: f64,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ScrollRequest {
    pub section: SectionId,
    pub anchor: String,
    pub smooth: bool,
}

/// An observation of one set of rendered sections.
///
/// Turns layout snapshots into enter/leave events, in the order the layouts
/// are given (document order on a page).
#[derive(Debug, Clone)]
pub struct Subscription {
    id: SubscriptionId,
    sections: Vec<SectionId>,
    band: VisibilityBand,
    intersecting: HashSet<SectionId>,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn sections(&self) -> &[SectionId] {
        &self.sections
    }

    pub fn probe(
        &mut self,
        scroll_top: f64,
        viewport_height: f64,
        layouts: &[SectionLayout],
    ) -> Vec<VisibilityEvent> {
        let mut events: Vec<VisibilityEvent> = Vec::new();
        for l in layouts.iter() {
            if !self.sections.contains(&l.section) {
                continue;
            }
            let now = self.band.intersects(
                viewport_height,
                l.top - scroll_top,
                l.bottom - scroll_top,
            );
            let was = self.intersecting.contains(&l.section);
            if now != was {
                if now {
                    self.intersecting.insert(l.section);
                } else {
                    self.intersecting.remove(&l.section);
                }
                events.push(VisibilityEvent {
                    subscription: self.id,
                    section: l.section,
                    intersecting: now,
                });
            }
        }
        events
    }
}

#[derive(Debug, Clone)]
pub struct SectionTracker {
    band: VisibilityBand,
    sections: Vec<SectionId>,
    current: Option<SubscriptionId>,
    next_id: u64,
    active: Option<SectionId>,
}

impl SectionTracker {
    pub fn new(band: VisibilityBand) -> SectionTracker {
        SectionTracker {
            band,
            sections: Vec::new(),
            current: None,
            next_id: 1,
            active: None,
        }
    }

    pub fn band(&self) -> VisibilityBand {
        self.band
    }

    /// The section most recently reported entering the band, if any.
    pub fn active(&self) -> Option<SectionId> {
        self.active
    }

    /// Starts observing a new set of rendered sections, tearing down the
    /// previous subscription. The active section survives only if it is
    /// still rendered.
    pub fn subscribe(&mut self, sections: &[SectionId]) -> Subscription {
        self.unsubscribe();
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.sections = sections.to_vec();
        self.current = Some(id);
        if let Some(a) = self.active {
            if !self.sections.contains(&a) {
                self.active = None;
            }
        }
        debug!("subscribe: {:?} sections {:?}", id, self.sections);
        Subscription {
            id,
            sections: self.sections.clone(),
            band: self.band,
            intersecting: HashSet::new(),
        }
    }

    pub fn unsubscribe(&mut self) {
        if let Some(id) = self.current.take() {
            debug!("unsubscribe: {:?}", id);
        }
    }

    /// Applies one event. Returns true when the active section changed.
    pub fn observe(&mut self, event: &VisibilityEvent) -> bool {
        if self.current != Some(event.subscription) {
            debug!("observe: ignoring stale event {:?}", event);
            return false;
        }
        if !event.intersecting || !self.sections.contains(&event.section) {
            return false;
        }
        let changed = self.active != Some(event.section);
        self.active = Some(event.section);
        changed
    }

    /// Applies a batch of events delivered together, in order.
    pub fn observe_all(&mut self, events: &[VisibilityEvent]) -> Option<SectionId> {
        for e in events.iter() {
            self.observe(e);
        }
        self.active
    }

    /// A smooth scroll to the section's anchor. Does not touch the active
    /// section.
    pub fn navigate(&self, section: SectionId) -> Option<ScrollRequest> {
        if !self.sections.contains(&section) {
            return None;
        }
        Some(ScrollRequest {
            section,
            anchor: format!("#{}", section.anchor()),
            smooth: true,
        })
    }
}

impl Default for SectionTracker {
    fn default() -> Self {
        SectionTracker::new(VisibilityBand::DEFAULT)
    }
}
