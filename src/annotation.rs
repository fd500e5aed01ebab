use log::warn;

use crate::geometry::fit_circle;
use crate::models::{Circle, EclipseRecord, Point, Role};

/// Outcome of a state-machine transition, returned for a presentation layer
/// to react to. The machine itself never draws anything.
#[derive(Debug, Clone, PartialEq)]
pub enum AnnotationEvent {
    /// The point was accepted into the active circle's buffer.
    PointBuffered { buffered: usize },
    /// No circle is being collected; the click has no effect.
    PointIgnored,
    /// Three points resolved to a circle. `display` is in the coordinate
    /// space the points were clicked in, `full` is rescaled to the source
    /// image resolution (integer pixel values).
    CircleCompleted {
        role: Role,
        display: Circle,
        full: Circle,
    },
    /// The buffered points do not define a circle. The offending last point
    /// was dropped; the first two stay buffered so the operator can pick a
    /// different third point.
    DegenerateInput,
}

/// Interactive ground-truth capture state for a single image.
///
/// Clicks arrive in the coordinate space of the resized image being
/// displayed; completed circles are stored rescaled to full resolution so the
/// emitted record lines up with the source image. The surrounding interactive
/// loop owns sequencing and persistence.
#[derive(Debug, Clone)]
pub struct AnnotationSession {
    path: String,
    image_type: String,
    solar: Option<Circle>,
    lunar: Option<Circle>,
    complete: bool,
    active: Option<Role>,
    points: Vec<Point>,
    /// Full-resolution width over displayed width.
    display_ratio: f64,
}

impl AnnotationSession {
    pub fn new(path: impl Into<String>, full_width: u32, display_width: u32) -> Self {
        Self {
            path: path.into(),
            image_type: String::new(),
            solar: None,
            lunar: None,
            complete: false,
            active: None,
            points: Vec::new(),
            display_ratio: full_width as f64 / display_width as f64,
        }
    }

    /// Starts collecting points for `role`. Any previously recorded circle
    /// for that role and any partially collected points are discarded.
    pub fn activate(&mut self, role: Role) {
        match role {
            Role::Solar => self.solar = None,
            Role::Lunar => self.lunar = None,
        }
        self.active = Some(role);
        self.points.clear();
        self.refresh_complete();
    }

    /// Feeds one clicked point to the active circle. On the third point the
    /// circle is computed, rescaled to full resolution and stored, and the
    /// machine returns to idle.
    pub fn add_point(&mut self, point: Point) -> AnnotationEvent {
        let Some(role) = self.active else {
            warn!("no active circle; click has no effect");
            return AnnotationEvent::PointIgnored;
        };
        if self.points.len() >= 3 {
            warn!("three points already buffered; click has no effect");
            return AnnotationEvent::PointIgnored;
        }

        self.points.push(point);
        if self.points.len() < 3 {
            return AnnotationEvent::PointBuffered { buffered: self.points.len() };
        }

        let buffered = [self.points[0], self.points[1], self.points[2]];
        match fit_circle(&buffered) {
            Ok(display) => {
                let full = display.scaled(self.display_ratio);
                match role {
                    Role::Solar => self.solar = Some(full),
                    Role::Lunar => self.lunar = Some(full),
                }
                self.active = None;
                self.points.clear();
                self.refresh_complete();
                AnnotationEvent::CircleCompleted { role, display, full }
            }
            Err(_) => {
                // Keep the first two points; the third gets re-clicked.
                self.points.pop();
                AnnotationEvent::DegenerateInput
            }
        }
    }

    /// Records the operator-chosen classification type.
    pub fn set_type(&mut self, image_type: &str) {
        self.image_type = image_type.to_string();
        self.refresh_complete();
    }

    /// Clears both circles, the type, and any partial collection.
    pub fn reset(&mut self) {
        self.image_type.clear();
        self.solar = None;
        self.lunar = None;
        self.active = None;
        self.points.clear();
        self.refresh_complete();
    }

    /// True iff the type is set and non-empty, the solar circle is present,
    /// and no circle is currently being collected.
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn active_role(&self) -> Option<Role> {
        self.active
    }

    pub fn buffered_points(&self) -> &[Point] {
        &self.points
    }

    pub fn solar_circle(&self) -> Option<&Circle> {
        self.solar.as_ref()
    }

    pub fn lunar_circle(&self) -> Option<&Circle> {
        self.lunar.as_ref()
    }

    pub fn image_type(&self) -> &str {
        &self.image_type
    }

    /// Snapshot in record-file form, with full-resolution circles.
    pub fn record(&self) -> EclipseRecord {
        EclipseRecord {
            name: self.path.clone(),
            image_type: self.image_type.clone(),
            solar: self.solar,
            lunar: self.lunar,
        }
    }

    fn refresh_complete(&mut self) {
        self.complete =
            !self.image_type.is_empty() && self.solar.is_some() && self.active.is_none();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> AnnotationSession {
        // Display at half the source resolution.
        AnnotationSession::new("img.jpg", 1600, 800)
    }

    fn click_circle(s: &mut AnnotationSession) -> AnnotationEvent {
        // Points on a circle centered at (100, 100) with radius 50.
        s.add_point(Point::new(130.0, 140.0));
        s.add_point(Point::new(60.0, 130.0));
        s.add_point(Point::new(100.0, 50.0))
    }

    #[test]
    fn clicks_without_active_role_are_ignored() {
        let mut s = session();
        assert_eq!(s.add_point(Point::new(1.0, 2.0)), AnnotationEvent::PointIgnored);
        assert!(s.buffered_points().is_empty());
    }

    #[test]
    fn third_point_completes_and_rescales_the_circle() {
        let mut s = session();
        s.activate(Role::Solar);
        let event = click_circle(&mut s);
        match event {
            AnnotationEvent::CircleCompleted { role, display, full } => {
                assert_eq!(role, Role::Solar);
                assert!((display.cx - 100.0).abs() < 1e-9);
                assert!((display.cy - 100.0).abs() < 1e-9);
                assert!((display.r - 50.0).abs() < 1e-9);
                assert_eq!(full, Circle::new(200.0, 200.0, 100.0));
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert_eq!(s.active_role(), None);
        assert_eq!(s.solar_circle(), Some(&Circle::new(200.0, 200.0, 100.0)));
    }

    #[test]
    fn complete_tracks_type_solar_and_collection_state() {
        let mut s = session();
        assert!(!s.is_complete());

        s.set_type("partial");
        assert!(!s.is_complete());

        s.activate(Role::Solar);
        click_circle(&mut s);
        assert!(s.is_complete());

        // Re-collecting a circle makes the image incomplete again.
        s.activate(Role::Lunar);
        assert!(!s.is_complete());
        click_circle(&mut s);
        assert!(s.is_complete());

        s.reset();
        assert!(!s.is_complete());
        assert_eq!(s.solar_circle(), None);
        assert_eq!(s.lunar_circle(), None);
        assert_eq!(s.image_type(), "");
    }

    #[test]
    fn degenerate_third_point_is_recoverable() {
        let mut s = session();
        s.activate(Role::Solar);
        s.add_point(Point::new(10.0, 10.0));
        s.add_point(Point::new(20.0, 20.0));
        // Collinear with the first two.
        let event = s.add_point(Point::new(30.0, 30.0));
        assert_eq!(event, AnnotationEvent::DegenerateInput);
        assert_eq!(s.buffered_points().len(), 2);
        assert_eq!(s.active_role(), Some(Role::Solar));

        // A usable third point still completes the circle.
        let event = s.add_point(Point::new(25.0, 5.0));
        assert!(matches!(event, AnnotationEvent::CircleCompleted { .. }));
    }

    #[test]
    fn activating_a_role_discards_its_previous_circle() {
        let mut s = session();
        s.activate(Role::Solar);
        click_circle(&mut s);
        assert!(s.solar_circle().is_some());

        s.activate(Role::Solar);
        assert_eq!(s.solar_circle(), None);
        assert_eq!(s.active_role(), Some(Role::Solar));
    }

    #[test]
    fn fourth_click_while_idle_buffer_is_impossible() {
        let mut s = session();
        s.activate(Role::Lunar);
        click_circle(&mut s);
        // Circle completed, machine is idle again.
        assert_eq!(s.add_point(Point::new(5.0, 5.0)), AnnotationEvent::PointIgnored);
    }

    #[test]
    fn record_serializes_full_resolution_circles() {
        let mut s = session();
        s.set_type("total");
        s.activate(Role::Solar);
        click_circle(&mut s);
        let record = s.record();
        assert_eq!(record.to_line(), "img.jpg|total|(200, 200, 100)|None");
    }
}
