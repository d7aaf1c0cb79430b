// src/telemetry/model.rs
//! Change-detected telemetry state
//!
//! One setter per telemetry field, all following the same shape: invalid
//! input is rejected silently, "received" fires on every accepted update for
//! the fields that document it, and "changed" fires only when the accepted
//! value differs from the stored one. All setters are called from the worker;
//! readers on other threads take a cheap snapshot.

use crate::device::DeviceDiscovery;
use crate::events::{InterpreterEvent, NotificationHub};
use crate::filter::{bypass_filter, PositionFilter};
use crate::settings::InterpreterSettings;
use crate::telemetry::data::{
    FixMethod, FixMode, FixQuality, Position, SatelliteInfo, TelemetrySnapshot,
};
use chrono::{DateTime, Local, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

struct State {
    snapshot: TelemetrySnapshot,
    /// Device-estimated positional error in meters for the current fix
    /// quality. NaN until the device reports one, which keeps the position
    /// filter bypassed.
    precision_estimate: f64,
}

struct FilterSlot {
    filter: Option<Box<dyn PositionFilter>>,
    initialized: bool,
}

pub struct TelemetryModel {
    state: RwLock<State>,
    hub: Arc<NotificationHub>,
    discovery: Arc<dyn DeviceDiscovery>,
    filter: Mutex<FilterSlot>,
    filter_enabled: AtomicBool,
    maximum_hdop: f64,
    maximum_vdop: f64,
}

impl TelemetryModel {
    pub fn new(
        hub: Arc<NotificationHub>,
        discovery: Arc<dyn DeviceDiscovery>,
        settings: &InterpreterSettings,
    ) -> Self {
        Self {
            state: RwLock::new(State {
                snapshot: TelemetrySnapshot::default(),
                precision_estimate: f64::NAN,
            }),
            hub,
            discovery,
            filter: Mutex::new(FilterSlot {
                filter: None,
                initialized: false,
            }),
            filter_enabled: AtomicBool::new(settings.is_filter_enabled),
            maximum_hdop: settings.maximum_hdop,
            maximum_vdop: settings.maximum_vdop,
        }
    }

    /// A copy of every field, safe to call from any thread.
    pub fn snapshot(&self) -> TelemetrySnapshot {
        self.state.read().unwrap().snapshot.clone()
    }

    pub fn position(&self) -> Option<Position> {
        self.state.read().unwrap().snapshot.position
    }

    pub fn fix_quality(&self) -> Option<FixQuality> {
        self.state.read().unwrap().snapshot.fix_quality
    }

    pub fn is_fix_obtained(&self) -> bool {
        self.state.read().unwrap().snapshot.fix_obtained
    }

    /// Install a smoothing strategy. The filter sees the first position of
    /// the session through `initialize` before it is ever asked to smooth.
    pub fn set_filter(&self, filter: Option<Box<dyn PositionFilter>>) {
        let mut slot = self.filter.lock().unwrap();
        slot.filter = filter;
        slot.initialized = false;
    }

    pub fn set_filter_enabled(&self, enabled: bool) {
        self.filter_enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn is_filter_enabled(&self) -> bool {
        self.filter_enabled.load(Ordering::Relaxed)
    }

    /// Called by the worker after each packet with the device's error
    /// estimate for the current fix quality.
    pub(crate) fn update_precision_estimate(&self, estimate: f64) {
        self.state.write().unwrap().precision_estimate = estimate;
    }

    /// Accept a raw position fix. Samples arriving while the stored HDOP or
    /// VDOP exceeds the configured maximum are discarded outright; accepted
    /// samples run through the filter pipeline unless the precision signal
    /// is degenerate.
    pub fn set_position(&self, raw: Position) {
        if !raw.is_valid() {
            return;
        }

        let (hdop, vdop, precision, bearing, speed) = {
            let state = self.state.read().unwrap();
            (
                state.snapshot.horizontal_dop,
                state.snapshot.vertical_dop,
                state.precision_estimate,
                state.snapshot.bearing,
                state.snapshot.speed,
            )
        };

        // Noisy-fix gate: too much dilution means the sample is garbage.
        if hdop.map_or(false, |h| h > self.maximum_hdop)
            || vdop.map_or(false, |v| v > self.maximum_vdop)
        {
            return;
        }

        let accepted = self.smooth(raw, precision, hdop, vdop, bearing, speed);

        self.hub.publish(InterpreterEvent::PositionReceived(accepted));

        let changed = {
            let mut state = self.state.write().unwrap();
            if state.snapshot.position != Some(accepted) {
                state.snapshot.position = Some(accepted);
                true
            } else {
                false
            }
        };
        if changed {
            // Coalescing asynchronous delivery; see events.rs.
            self.hub.publish_position_changed(accepted);
            self.discovery.broadcast_position(accepted);
        }
    }

    fn smooth(
        &self,
        raw: Position,
        precision: f64,
        hdop: Option<f64>,
        vdop: Option<f64>,
        bearing: Option<f64>,
        speed: Option<f64>,
    ) -> Position {
        if !self.filter_enabled.load(Ordering::Relaxed) {
            return raw;
        }
        let mut guard = self.filter.lock().unwrap();
        let slot = &mut *guard;
        let Some(filter) = slot.filter.as_mut() else {
            return raw;
        };
        if !slot.initialized {
            filter.initialize(raw);
            slot.initialized = true;
            return raw;
        }
        let hdop = hdop.unwrap_or(f64::NAN);
        let vdop = vdop.unwrap_or(f64::NAN);
        let quality = precision * hdop * vdop;
        if bypass_filter(quality) {
            return raw;
        }
        filter.filter(
            raw,
            precision,
            hdop,
            vdop,
            bearing.unwrap_or(0.0),
            speed.unwrap_or(0.0),
        )
    }

    /// Speed over ground in km/h.
    pub fn set_speed(&self, speed: f64) {
        if !speed.is_finite() || speed < 0.0 {
            return;
        }
        self.hub.publish(InterpreterEvent::SpeedReceived(speed));
        if self.store_scalar(|s| &mut s.speed, speed) {
            self.hub.publish(InterpreterEvent::SpeedChanged(speed));
            self.discovery.broadcast_speed(speed);
        }
    }

    /// Direction of travel in degrees, normalized to [0, 360).
    pub fn set_bearing(&self, bearing: f64) {
        if !bearing.is_finite() {
            return;
        }
        let bearing = bearing.rem_euclid(360.0);
        self.hub.publish(InterpreterEvent::BearingReceived(bearing));
        if self.store_scalar(|s| &mut s.bearing, bearing) {
            self.hub.publish(InterpreterEvent::BearingChanged(bearing));
            self.discovery.broadcast_bearing(bearing);
        }
    }

    /// Direction the antenna faces in degrees, normalized to [0, 360).
    pub fn set_heading(&self, heading: f64) {
        if !heading.is_finite() {
            return;
        }
        let heading = heading.rem_euclid(360.0);
        self.hub.publish(InterpreterEvent::HeadingReceived(heading));
        if self.store_scalar(|s| &mut s.heading, heading) {
            self.hub.publish(InterpreterEvent::HeadingChanged(heading));
            self.discovery.broadcast_heading(heading);
        }
    }

    /// Altitude above mean sea level in meters.
    pub fn set_altitude(&self, altitude: f64) {
        if !altitude.is_finite() {
            return;
        }
        self.hub.publish(InterpreterEvent::AltitudeReceived(altitude));
        if self.store_scalar(|s| &mut s.altitude, altitude) {
            self.hub.publish(InterpreterEvent::AltitudeChanged(altitude));
            self.discovery.broadcast_altitude(altitude);
        }
    }

    /// Altitude above the WGS84 ellipsoid in meters.
    pub fn set_altitude_above_ellipsoid(&self, altitude: f64) {
        if !altitude.is_finite() {
            return;
        }
        self.hub
            .publish(InterpreterEvent::AltitudeAboveEllipsoidReceived(altitude));
        if self.store_scalar(|s| &mut s.altitude_above_ellipsoid, altitude) {
            self.hub
                .publish(InterpreterEvent::AltitudeAboveEllipsoidChanged(altitude));
        }
    }

    /// Geoid-to-ellipsoid separation in meters.
    pub fn set_geoidal_separation(&self, separation: f64) {
        if !separation.is_finite() {
            return;
        }
        if self.store_scalar(|s| &mut s.geoidal_separation, separation) {
            self.hub
                .publish(InterpreterEvent::GeoidalSeparationChanged(separation));
        }
    }

    /// Magnetic variation in degrees, east positive.
    pub fn set_magnetic_variation(&self, variation: f64) {
        if !variation.is_finite() {
            return;
        }
        if self.store_scalar(|s| &mut s.magnetic_variation, variation) {
            self.hub
                .publish(InterpreterEvent::MagneticVariationAvailable(variation));
        }
    }

    /// Whether the device currently holds a fix.
    pub fn set_fix_status(&self, obtained: bool) {
        let changed = {
            let mut state = self.state.write().unwrap();
            if state.snapshot.fix_obtained != obtained {
                state.snapshot.fix_obtained = obtained;
                true
            } else {
                false
            }
        };
        if changed {
            self.hub.publish(if obtained {
                InterpreterEvent::FixAcquired
            } else {
                InterpreterEvent::FixLost
            });
        }
    }

    pub fn set_fix_quality(&self, quality: FixQuality) {
        if self.store_scalar(|s| &mut s.fix_quality, quality) {
            self.hub.publish(InterpreterEvent::FixQualityChanged(quality));
        }
    }

    pub fn set_fix_method(&self, method: FixMethod) {
        if self.store_scalar(|s| &mut s.fix_method, method) {
            self.hub.publish(InterpreterEvent::FixMethodChanged(method));
        }
    }

    pub fn set_fix_mode(&self, mode: FixMode) {
        if self.store_scalar(|s| &mut s.fix_mode, mode) {
            self.hub.publish(InterpreterEvent::FixModeChanged(mode));
        }
    }

    pub fn set_horizontal_dop(&self, dop: f64) {
        if !Self::dop_is_valid(dop) {
            return;
        }
        if self.store_scalar(|s| &mut s.horizontal_dop, dop) {
            self.hub
                .publish(InterpreterEvent::HorizontalDilutionChanged(dop));
        }
    }

    pub fn set_vertical_dop(&self, dop: f64) {
        if !Self::dop_is_valid(dop) {
            return;
        }
        if self.store_scalar(|s| &mut s.vertical_dop, dop) {
            self.hub
                .publish(InterpreterEvent::VerticalDilutionChanged(dop));
        }
    }

    pub fn set_mean_dop(&self, dop: f64) {
        if !Self::dop_is_valid(dop) {
            return;
        }
        if self.store_scalar(|s| &mut s.mean_dop, dop) {
            self.hub.publish(InterpreterEvent::MeanDilutionChanged(dop));
        }
    }

    fn dop_is_valid(dop: f64) -> bool {
        dop.is_finite() && dop > 0.0
    }

    /// Satellite date/time in UTC. Also derives the local-time notification
    /// and, when the discovery collaborator asks for it and a fix is held,
    /// forwards the timestamp for host-clock synchronization.
    pub fn set_utc_date_time(&self, utc: DateTime<Utc>) {
        let (changed, fix_obtained) = {
            let mut state = self.state.write().unwrap();
            let fix = state.snapshot.fix_obtained;
            if state.snapshot.utc_date_time != Some(utc) {
                state.snapshot.utc_date_time = Some(utc);
                (true, fix)
            } else {
                (false, fix)
            }
        };
        if changed {
            self.hub.publish(InterpreterEvent::UtcDateTimeChanged(utc));
            self.hub.publish(InterpreterEvent::LocalDateTimeChanged(
                utc.with_timezone(&Local),
            ));
            if fix_obtained && self.discovery.sync_clock_on_fix() {
                self.discovery.synchronize_clock(utc);
            }
        }
    }

    /// Merge reported satellites into the set, keyed by PRN. Unseen PRNs are
    /// appended in arrival order; already-known PRNs are left untouched.
    /// Duplicate PRNs never grow the set.
    pub fn set_satellites(&self, incoming: Vec<SatelliteInfo>) {
        let changed = {
            let mut state = self.state.write().unwrap();
            let satellites = &mut state.snapshot.satellites;
            let before = satellites.len();
            for satellite in incoming {
                if !satellites.iter().any(|s| s.prn == satellite.prn) {
                    satellites.push(satellite);
                }
            }
            satellites.len() != before
        };
        if changed {
            self.publish_satellites_changed();
        }
    }

    /// Flip the used-in-fix flag so that exactly the listed PRNs are marked
    /// used. Fires a single changed notification, and only if at least one
    /// flag actually flipped.
    pub fn set_fixed_satellites(&self, prns: &[u16]) {
        let changed = {
            let mut state = self.state.write().unwrap();
            let mut flips = 0;
            for satellite in &mut state.snapshot.satellites {
                let used = prns.contains(&satellite.prn);
                if satellite.used != used {
                    satellite.used = used;
                    flips += 1;
                }
            }
            flips > 0
        };
        if changed {
            self.publish_satellites_changed();
        }
    }

    fn publish_satellites_changed(&self) {
        let satellites = self.state.read().unwrap().snapshot.satellites.clone();
        self.hub
            .publish(InterpreterEvent::SatellitesChanged(satellites));
    }

    /// Store a value if it differs from the current one. Returns whether it
    /// changed. The lock is released before any notification fires.
    fn store_scalar<T: PartialEq + Copy>(
        &self,
        field: impl Fn(&mut TelemetrySnapshot) -> &mut Option<T>,
        value: T,
    ) -> bool {
        let mut state = self.state.write().unwrap();
        let slot = field(&mut state.snapshot);
        if *slot != Some(value) {
            *slot = Some(value);
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingDiscovery {
        broadcast_positions: Mutex<Vec<Position>>,
        broadcast_speeds: Mutex<Vec<f64>>,
        clock_syncs: AtomicUsize,
        sync_clock: bool,
    }

    #[async_trait::async_trait]
    impl DeviceDiscovery for RecordingDiscovery {
        async fn any_available_device(&self) -> Option<Box<dyn crate::device::Device>> {
            None
        }
        fn broadcast_position(&self, position: Position) {
            self.broadcast_positions.lock().unwrap().push(position);
        }
        fn broadcast_speed(&self, speed: f64) {
            self.broadcast_speeds.lock().unwrap().push(speed);
        }
        fn sync_clock_on_fix(&self) -> bool {
            self.sync_clock
        }
        fn synchronize_clock(&self, _utc: DateTime<Utc>) {
            self.clock_syncs.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Shifts every filtered position by a fixed offset so tests can tell
    /// raw from smoothed.
    struct OffsetFilter {
        initialized_with: Option<Position>,
    }

    impl PositionFilter for OffsetFilter {
        fn initialize(&mut self, first: Position) {
            self.initialized_with = Some(first);
        }
        fn filter(
            &mut self,
            raw: Position,
            _precision_estimate: f64,
            _hdop: f64,
            _vdop: f64,
            _bearing: f64,
            _speed: f64,
        ) -> Position {
            Position::new(raw.latitude + 1.0, raw.longitude + 1.0)
        }
    }

    struct Harness {
        model: TelemetryModel,
        hub: Arc<NotificationHub>,
        discovery: Arc<RecordingDiscovery>,
        events: Arc<Mutex<Vec<InterpreterEvent>>>,
    }

    fn harness_with(settings: InterpreterSettings, discovery: RecordingDiscovery) -> Harness {
        let hub = Arc::new(NotificationHub::new());
        let discovery = Arc::new(discovery);
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        hub.subscribe(move |event| sink.lock().unwrap().push(event.clone()));
        let model = TelemetryModel::new(
            Arc::clone(&hub),
            Arc::clone(&discovery) as Arc<dyn DeviceDiscovery>,
            &settings,
        );
        Harness {
            model,
            hub,
            discovery,
            events,
        }
    }

    fn harness() -> Harness {
        harness_with(InterpreterSettings::default(), RecordingDiscovery::default())
    }

    fn count(events: &Arc<Mutex<Vec<InterpreterEvent>>>, pred: impl Fn(&InterpreterEvent) -> bool) -> usize {
        events.lock().unwrap().iter().filter(|e| pred(e)).count()
    }

    #[tokio::test]
    async fn test_same_speed_twice_fires_two_received_one_changed() {
        let h = harness();
        h.model.set_speed(42.0);
        h.model.set_speed(42.0);
        assert_eq!(
            count(&h.events, |e| matches!(e, InterpreterEvent::SpeedReceived(_))),
            2
        );
        assert_eq!(
            count(&h.events, |e| matches!(e, InterpreterEvent::SpeedChanged(_))),
            1
        );
        assert_eq!(*h.discovery.broadcast_speeds.lock().unwrap(), vec![42.0]);
        h.hub.shutdown().await;
    }

    #[tokio::test]
    async fn test_invalid_values_rejected_without_events() {
        let h = harness();
        h.model.set_speed(f64::NAN);
        h.model.set_speed(-3.0);
        h.model.set_bearing(f64::INFINITY);
        h.model.set_altitude(f64::NAN);
        h.model.set_horizontal_dop(0.0);
        h.model.set_position(Position::new(95.0, 0.0));
        assert!(h.events.lock().unwrap().is_empty());
        assert_eq!(h.model.snapshot(), TelemetrySnapshot::default());
        h.hub.shutdown().await;
    }

    #[tokio::test]
    async fn test_bearing_normalized_to_circle() {
        let h = harness();
        h.model.set_bearing(370.0);
        assert_eq!(h.model.snapshot().bearing, Some(10.0));
        h.model.set_bearing(-90.0);
        assert_eq!(h.model.snapshot().bearing, Some(270.0));
        h.hub.shutdown().await;
    }

    #[tokio::test]
    async fn test_filter_disabled_stores_raw() {
        let h = harness_with(
            InterpreterSettings {
                is_filter_enabled: false,
                ..Default::default()
            },
            RecordingDiscovery::default(),
        );
        h.model.set_filter(Some(Box::new(OffsetFilter {
            initialized_with: None,
        })));
        let raw = Position::new(10.0, 20.0);
        h.model.set_position(raw);
        assert_eq!(h.model.position(), Some(raw));
        h.hub.shutdown().await;
    }

    #[tokio::test]
    async fn test_filter_applied_after_initialization() {
        let h = harness();
        h.model.set_filter(Some(Box::new(OffsetFilter {
            initialized_with: None,
        })));
        h.model.set_horizontal_dop(1.2);
        h.model.set_vertical_dop(1.8);
        h.model.update_precision_estimate(6.0);

        // First sample seeds the filter and is stored verbatim.
        let first = Position::new(10.0, 20.0);
        h.model.set_position(first);
        assert_eq!(h.model.position(), Some(first));

        // Second sample goes through the filter.
        h.model.set_position(Position::new(11.0, 21.0));
        assert_eq!(h.model.position(), Some(Position::new(12.0, 22.0)));
        h.hub.shutdown().await;
    }

    #[tokio::test]
    async fn test_degenerate_quality_bypasses_enabled_filter() {
        let h = harness();
        h.model.set_filter(Some(Box::new(OffsetFilter {
            initialized_with: None,
        })));
        h.model.set_horizontal_dop(1.2);
        h.model.set_vertical_dop(1.8);

        h.model.set_position(Position::new(1.0, 1.0)); // initializes

        // Precision estimate of zero: quality is exactly zero, raw wins.
        h.model.update_precision_estimate(0.0);
        let raw = Position::new(2.0, 2.0);
        h.model.set_position(raw);
        assert_eq!(h.model.position(), Some(raw));

        // No estimate at all (NaN): still bypassed.
        h.model.update_precision_estimate(f64::NAN);
        let raw = Position::new(3.0, 3.0);
        h.model.set_position(raw);
        assert_eq!(h.model.position(), Some(raw));
        h.hub.shutdown().await;
    }

    #[tokio::test]
    async fn test_noisy_fix_discarded_by_dop_gate() {
        let h = harness_with(
            InterpreterSettings {
                maximum_hdop: 6.0,
                ..Default::default()
            },
            RecordingDiscovery::default(),
        );
        h.model.set_horizontal_dop(10.0);
        h.events.lock().unwrap().clear();

        h.model.set_position(Position::new(5.0, 5.0));
        assert_eq!(h.model.position(), None);
        assert_eq!(
            count(&h.events, |e| matches!(
                e,
                InterpreterEvent::PositionReceived(_)
            )),
            0
        );
        h.hub.shutdown().await;
    }

    #[tokio::test]
    async fn test_duplicate_position_fires_received_not_changed() {
        let h = harness();
        let raw = Position::new(48.85, 2.35);
        h.model.set_position(raw);
        h.model.set_position(raw);
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(
            count(&h.events, |e| matches!(
                e,
                InterpreterEvent::PositionReceived(_)
            )),
            2
        );
        assert_eq!(
            count(&h.events, |e| matches!(
                e,
                InterpreterEvent::PositionChanged(_)
            )),
            1
        );
        assert_eq!(*h.discovery.broadcast_positions.lock().unwrap(), vec![raw]);
        h.hub.shutdown().await;
    }

    #[tokio::test]
    async fn test_satellite_merge_never_duplicates_prns() {
        let h = harness();
        h.model.set_satellites(vec![
            SatelliteInfo::new(7),
            SatelliteInfo::new(12),
            SatelliteInfo::new(7),
        ]);
        assert_eq!(h.model.snapshot().satellites.len(), 2);

        // Re-reporting known PRNs leaves the set untouched and fires nothing.
        h.events.lock().unwrap().clear();
        h.model
            .set_satellites(vec![SatelliteInfo::new(12), SatelliteInfo::new(7)]);
        assert_eq!(h.model.snapshot().satellites.len(), 2);
        assert!(h.events.lock().unwrap().is_empty());

        // Arrival order is preserved for reporting.
        let prns: Vec<u16> = h.model.snapshot().satellites.iter().map(|s| s.prn).collect();
        assert_eq!(prns, vec![7, 12]);
        h.hub.shutdown().await;
    }

    #[tokio::test]
    async fn test_fixed_satellites_fire_single_change_on_flip() {
        let h = harness();
        h.model
            .set_satellites(vec![SatelliteInfo::new(7), SatelliteInfo::new(12)]);
        h.events.lock().unwrap().clear();

        h.model.set_fixed_satellites(&[7]);
        assert_eq!(
            count(&h.events, |e| matches!(
                e,
                InterpreterEvent::SatellitesChanged(_)
            )),
            1
        );
        assert_eq!(h.model.snapshot().satellites_used(), 1);

        // Same set again: no flags flip, no notification.
        h.events.lock().unwrap().clear();
        h.model.set_fixed_satellites(&[7]);
        assert!(h.events.lock().unwrap().is_empty());
        h.hub.shutdown().await;
    }

    #[tokio::test]
    async fn test_fix_status_transitions() {
        let h = harness();
        h.model.set_fix_status(true);
        h.model.set_fix_status(true);
        h.model.set_fix_status(false);
        assert_eq!(
            count(&h.events, |e| matches!(e, InterpreterEvent::FixAcquired)),
            1
        );
        assert_eq!(
            count(&h.events, |e| matches!(e, InterpreterEvent::FixLost)),
            1
        );
        h.hub.shutdown().await;
    }

    #[tokio::test]
    async fn test_utc_date_time_fires_both_clocks_and_syncs_host() {
        let h = harness_with(
            InterpreterSettings::default(),
            RecordingDiscovery {
                sync_clock: true,
                ..Default::default()
            },
        );
        let utc = Utc::now();
        h.model.set_fix_status(true);
        h.model.set_utc_date_time(utc);
        h.model.set_utc_date_time(utc);

        assert_eq!(
            count(&h.events, |e| matches!(
                e,
                InterpreterEvent::UtcDateTimeChanged(_)
            )),
            1
        );
        assert_eq!(
            count(&h.events, |e| matches!(
                e,
                InterpreterEvent::LocalDateTimeChanged(_)
            )),
            1
        );
        assert_eq!(h.discovery.clock_syncs.load(Ordering::SeqCst), 1);
        h.hub.shutdown().await;
    }

    #[tokio::test]
    async fn test_no_clock_sync_without_fix() {
        let h = harness_with(
            InterpreterSettings::default(),
            RecordingDiscovery {
                sync_clock: true,
                ..Default::default()
            },
        );
        h.model.set_utc_date_time(Utc::now());
        assert_eq!(h.discovery.clock_syncs.load(Ordering::SeqCst), 0);
        h.hub.shutdown().await;
    }

    #[tokio::test]
    async fn test_magnetic_variation_availability_only() {
        let h = harness();
        h.model.set_magnetic_variation(-2.5);
        h.model.set_magnetic_variation(-2.5);
        assert_eq!(
            count(&h.events, |e| matches!(
                e,
                InterpreterEvent::MagneticVariationAvailable(_)
            )),
            1
        );
        h.hub.shutdown().await;
    }
}
