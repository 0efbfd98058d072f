//! Viewport center, search radius and geolocation
//!
//! [`PositionStore`] owns the committed center and radius of one page. Radius
//! changes animate the displayed search circle for a fixed number of steps and
//! only commit on the last step, so a slider drag produces one refresh.

use std::fmt::Debug;

use async_trait::async_trait;
use pawmap_api::{Position, SearchRadius};

use crate::error::GeolocationError;

/// Center + radius pair that keys fetches and realtime subscriptions
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportKey {
    pub center: Position,
    pub radius: SearchRadius,
}

/// Search circle animation in progress
#[derive(Debug, Clone, Copy)]
struct RadiusAnimation {
    from_km: f64,
    target: SearchRadius,
    step: u32,
    steps: u32,
}

impl RadiusAnimation {
    fn displayed_km(&self) -> f64 {
        let to_km = f64::from(self.target.km());
        let t = f64::from(self.step) / f64::from(self.steps);
        self.from_km + (to_km - self.from_km) * t
    }
}

/// Outcome of a radius request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadiusRequest {
    /// Animation (re)started toward the new radius
    Animating,
    /// Already at that radius, nothing to do
    Unchanged,
}

/// One animation step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnimationFrame {
    /// Radius of the search circle to draw
    pub displayed_km: f64,
    /// Set on the final step: the radius that is now committed
    pub committed: Option<SearchRadius>,
}

#[derive(Debug)]
pub struct PositionStore {
    center: Position,
    radius: SearchRadius,
    displayed_km: f64,
    animation: Option<RadiusAnimation>,
    animation_steps: u32,
    geolocation_error: Option<GeolocationError>,
}

impl PositionStore {
    pub fn new(center: Position, radius: SearchRadius, animation_steps: u32) -> Self {
        Self {
            center,
            radius,
            displayed_km: f64::from(radius.km()),
            animation: None,
            animation_steps: animation_steps.max(1),
            geolocation_error: None,
        }
    }

    pub fn center(&self) -> Position {
        self.center
    }

    /// Committed radius (what fetches and subscriptions use)
    pub fn radius(&self) -> SearchRadius {
        self.radius
    }

    /// Radius of the search circle as currently drawn
    pub fn displayed_km(&self) -> f64 {
        self.displayed_km
    }

    pub fn key(&self) -> ViewportKey {
        ViewportKey {
            center: self.center,
            radius: self.radius,
        }
    }

    pub fn is_animating(&self) -> bool {
        self.animation.is_some()
    }

    pub fn geolocation_error(&self) -> Option<GeolocationError> {
        self.geolocation_error
    }

    /// Move the center. Returns whether it changed.
    pub fn set_center(&mut self, center: Position) -> bool {
        if center == self.center {
            return false;
        }
        self.center = center;
        true
    }

    /// Start animating toward `radius`.
    ///
    /// A request during an animation restarts it from the displayed radius.
    /// Requesting the radius that is already committed and displayed is a no-op.
    pub fn request_radius(&mut self, radius: SearchRadius) -> RadiusRequest {
        let target_km = f64::from(radius.km());
        if self.animation.is_none() && radius == self.radius && self.displayed_km == target_km {
            return RadiusRequest::Unchanged;
        }

        self.animation = Some(RadiusAnimation {
            from_km: self.displayed_km,
            target: radius,
            step: 0,
            steps: self.animation_steps,
        });
        RadiusRequest::Animating
    }

    /// Advance the animation by one step. `None` when idle.
    pub fn tick_animation(&mut self) -> Option<AnimationFrame> {
        let animation = self.animation.as_mut()?;
        animation.step += 1;
        self.displayed_km = animation.displayed_km();

        if animation.step < animation.steps {
            return Some(AnimationFrame {
                displayed_km: self.displayed_km,
                committed: None,
            });
        }

        let target = animation.target;
        self.animation = None;
        self.displayed_km = f64::from(target.km());
        self.radius = target;
        Some(AnimationFrame {
            displayed_km: self.displayed_km,
            committed: Some(target),
        })
    }

    /// Drop an in-flight animation, snapping the circle back to the committed radius
    pub fn cancel_animation(&mut self) {
        self.animation = None;
        self.displayed_km = f64::from(self.radius.km());
    }

    /// Apply a geolocation result.
    ///
    /// Success moves the center and clears any earlier error. Failure records
    /// the error and keeps the current center. Returns whether the center moved.
    pub fn apply_location(&mut self, result: Result<Position, GeolocationError>) -> bool {
        match result {
            Ok(position) => {
                self.geolocation_error = None;
                self.set_center(position)
            }
            Err(e) => {
                tracing::warn!(error = %e, center = %self.center, "Geolocation failed, keeping center");
                self.geolocation_error = Some(e);
                false
            }
        }
    }
}

/// Source of the device position
#[async_trait]
pub trait Geolocator: Debug + Send + Sync {
    /// Single current-position request
    async fn current_position(&self) -> Result<Position, GeolocationError>;
}

/// Always reports the configured position
#[derive(Debug, Clone, Copy)]
pub struct FixedGeolocator {
    position: Position,
}

impl FixedGeolocator {
    pub fn new(position: Position) -> Self {
        Self { position }
    }
}

#[async_trait]
impl Geolocator for FixedGeolocator {
    async fn current_position(&self) -> Result<Position, GeolocationError> {
        Ok(self.position)
    }
}

/// For hosts without a location source
#[derive(Debug, Clone, Copy, Default)]
pub struct UnsupportedGeolocator;

#[async_trait]
impl Geolocator for UnsupportedGeolocator {
    async fn current_position(&self) -> Result<Position, GeolocationError> {
        Err(GeolocationError::Unsupported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_store(steps: u32) -> PositionStore {
        PositionStore::new(Position::default(), SearchRadius::default(), steps)
    }

    fn radius(km: i64) -> SearchRadius {
        SearchRadius::new(km).unwrap()
    }

    #[test]
    fn test_radius_commits_only_on_last_step() {
        let mut store = make_store(10);
        assert_eq!(store.request_radius(radius(5)), RadiusRequest::Animating);

        for _ in 0..9 {
            let frame = store.tick_animation().unwrap();
            assert!(frame.committed.is_none());
            assert_eq!(store.radius().km(), 3);
        }

        let last = store.tick_animation().unwrap();
        assert_eq!(last.committed, Some(radius(5)));
        assert_eq!(last.displayed_km, 5.0);
        assert_eq!(store.radius().km(), 5);
        assert!(store.tick_animation().is_none());
    }

    #[test]
    fn test_animation_interpolates() {
        let mut store = make_store(4);
        store.request_radius(radius(7));

        let frames: Vec<f64> = std::iter::from_fn(|| store.tick_animation())
            .map(|f| f.displayed_km)
            .collect();
        assert_eq!(frames, vec![4.0, 5.0, 6.0, 7.0]);
    }

    #[test]
    fn test_new_request_restarts_from_displayed() {
        let mut store = make_store(4);
        store.request_radius(radius(7));
        store.tick_animation();
        store.tick_animation();
        assert_eq!(store.displayed_km(), 5.0);

        store.request_radius(radius(1));
        let first = store.tick_animation().unwrap();
        assert_eq!(first.displayed_km, 4.0);
        assert_eq!(store.radius().km(), 3);

        let committed = std::iter::from_fn(|| store.tick_animation())
            .filter_map(|f| f.committed)
            .collect::<Vec<_>>();
        assert_eq!(committed, vec![radius(1)]);
    }

    #[test]
    fn test_same_radius_is_unchanged() {
        let mut store = make_store(10);
        assert_eq!(store.request_radius(radius(3)), RadiusRequest::Unchanged);
        assert!(!store.is_animating());
    }

    #[test]
    fn test_geolocation_denied_keeps_center() {
        let mut store = make_store(10);
        let before = store.center();

        let moved = store.apply_location(Err(GeolocationError::PermissionDenied));

        assert!(!moved);
        assert_eq!(store.center(), before);
        assert_eq!(
            store.geolocation_error(),
            Some(GeolocationError::PermissionDenied)
        );
    }

    #[test]
    fn test_successful_locate_clears_error() {
        let mut store = make_store(10);
        store.apply_location(Err(GeolocationError::Timeout));

        let busan = Position::new(35.1796, 129.0756).unwrap();
        assert!(store.apply_location(Ok(busan)));
        assert_eq!(store.center(), busan);
        assert!(store.geolocation_error().is_none());
    }

    #[tokio::test]
    async fn test_provided_geolocators() {
        let busan = Position::new(35.1796, 129.0756).unwrap();
        assert_eq!(
            FixedGeolocator::new(busan).current_position().await,
            Ok(busan)
        );
        assert_eq!(
            UnsupportedGeolocator.current_position().await,
            Err(GeolocationError::Unsupported)
        );
    }
}
