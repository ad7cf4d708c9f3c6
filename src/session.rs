//! The schedule board session: loads a day's lessons, shapes them into the
//! teacher-by-timeslot matrix, and keeps a mounted widget in sync with
//! realtime changes and date navigation.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock, Weak};
use std::time::Duration;

use chrono::{Local, NaiveDate};
use tokio::sync::Mutex as AsyncMutex;

use crate::backend::{
    filter, CollectionService, ListOptions, SubscriptionId, ALL_RECORDS, GROUP_LESSON_COLLECTION,
    LESSON_COLLECTION, TEACHER_COLLECTION, TIMESLOT_COLLECTION,
};
use crate::debounce::{DebounceGate, DEFAULT_WINDOW};
use crate::error::{Result, ScheduleError};
use crate::records::{self, Assignment, Teacher, Timeslot};
use crate::schedule::{assemble_matrix, build_columns, ColumnSchema, TeacherScheduleMatrix};
use crate::widget::{GridConfig, GridData, ScheduleWidget, SearchConfig, WidgetHost};

pub const INDIVIDUAL_EXPAND: &str = "teacher,student,subject,room,timeslot";
pub const GROUP_EXPAND: &str = "teacher,student,subject,grouproom,timeslot";

/// Upper bound of lessons fetched per collection and day.
pub const DEFAULT_PAGE_SIZE: u32 = 200;

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub debounce: Duration,
    pub page_size: u32,
    pub start_date: NaiveDate,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_WINDOW,
            page_size: DEFAULT_PAGE_SIZE,
            start_date: Local::now().date_naive(),
        }
    }
}

/// What a load did to the widget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    /// A widget was constructed and mounted: on the first successful load, or
    /// again once the column schema changed.
    Mounted,
    /// The live widget received new data.
    Updated,
    /// A newer load already rendered; this result was dropped.
    Stale,
    /// The session was disposed while the load was in flight.
    Disposed,
}

#[derive(Debug, Clone)]
pub struct LoadOutcome {
    pub matrix: TeacherScheduleMatrix,
    pub render: RenderOutcome,
}

/// Reference data fetched once per session.
///
/// An empty result is not kept, so the next load asks again.
struct ReferenceCache<T> {
    value: AsyncMutex<Option<Arc<Vec<T>>>>,
}

impl<T> ReferenceCache<T> {
    fn new() -> Self {
        Self {
            value: AsyncMutex::new(None),
        }
    }

    async fn get_or_fetch<F, Fut>(&self, fetch: F) -> Result<Arc<Vec<T>>>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<Vec<T>>>,
    {
        let mut value = self.value.lock().await;
        if let Some(cached) = value.as_ref() {
            return Ok(Arc::clone(cached));
        }
        let fetched = Arc::new(fetch().await?);
        if !fetched.is_empty() {
            *value = Some(Arc::clone(&fetched));
        }
        Ok(fetched)
    }

    async fn peek(&self) -> Option<Arc<Vec<T>>> {
        self.value.lock().await.clone()
    }
}

#[derive(Default)]
struct WidgetSlot {
    widget: Option<Box<dyn ScheduleWidget>>,
    /// Schema the live widget was mounted with.
    columns: ColumnSchema,
    rendered_generation: u64,
}

pub struct ScheduleSession {
    service: Arc<dyn CollectionService>,
    host: Arc<dyn WidgetHost>,
    page_size: u32,
    selected_date: Mutex<NaiveDate>,
    timeslots: ReferenceCache<Timeslot>,
    teachers: ReferenceCache<Teacher>,
    columns: OnceLock<ColumnSchema>,
    widget: Mutex<WidgetSlot>,
    generation: AtomicU64,
    disposed: AtomicBool,
    reload: DebounceGate,
    subscriptions: AsyncMutex<Vec<(&'static str, SubscriptionId)>>,
}

impl ScheduleSession {
    /// Creates a session. Must be called from within a Tokio runtime, which
    /// runs the reload gate.
    pub fn new(
        service: Arc<dyn CollectionService>,
        host: Arc<dyn WidgetHost>,
        options: SessionOptions,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak: &Weak<Self>| {
            let weak = weak.clone();
            let reload = DebounceGate::spawn(options.debounce, move || {
                let weak = weak.clone();
                async move {
                    if let Some(session) = weak.upgrade() {
                        session.debounced_load().await;
                    }
                }
            });

            Self {
                service,
                host,
                page_size: options.page_size,
                selected_date: Mutex::new(options.start_date),
                timeslots: ReferenceCache::new(),
                teachers: ReferenceCache::new(),
                columns: OnceLock::new(),
                widget: Mutex::new(WidgetSlot::default()),
                generation: AtomicU64::new(0),
                disposed: AtomicBool::new(false),
                reload,
                subscriptions: AsyncMutex::new(Vec::new()),
            }
        })
    }

    pub fn selected_date(&self) -> NaiveDate {
        *self.selected_date.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn columns(&self) -> Option<&ColumnSchema> {
        self.columns.get()
    }

    pub fn has_widget(&self) -> bool {
        self.widget
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .widget
            .is_some()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    pub async fn cached_timeslots(&self) -> Option<Arc<Vec<Timeslot>>> {
        self.timeslots.peek().await
    }

    pub async fn cached_teachers(&self) -> Option<Arc<Vec<Teacher>>> {
        self.teachers.peek().await
    }

    /// Moves the selected date by `delta_days` and schedules a debounced reload.
    ///
    /// The reload reads the date when it runs, so a burst of calls loads only
    /// the final date.
    pub fn change_date(&self, delta_days: i64) -> NaiveDate {
        let date = {
            let mut selected = self.selected_date.lock().unwrap_or_else(|e| e.into_inner());
            match selected.checked_add_signed(chrono::Duration::days(delta_days)) {
                Some(next) => *selected = next,
                None => tracing::warn!(delta_days, "date navigation out of range"),
            }
            *selected
        };
        tracing::debug!(%date, "selected date changed");
        self.reload.trigger();
        date
    }

    /// Jumps to `date` and schedules a debounced reload.
    pub fn set_date(&self, date: NaiveDate) {
        *self.selected_date.lock().unwrap_or_else(|e| e.into_inner()) = date;
        tracing::debug!(%date, "selected date set");
        self.reload.trigger();
    }

    /// Schedules a debounced reload of the current date.
    pub fn request_reload(&self) {
        self.reload.trigger();
    }

    /// Loads the selected date and renders it.
    ///
    /// A fetch failure returns before the widget is touched, so the previous
    /// board stays on screen.
    pub async fn load_schedule(&self) -> Result<LoadOutcome> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let date = self.selected_date();
        tracing::debug!(%date, generation, "loading schedule");

        let timeslots = self
            .timeslots
            .get_or_fetch(|| self.fetch_reference(TIMESLOT_COLLECTION, "start"))
            .await?;
        let teachers = self
            .teachers
            .get_or_fetch(|| self.fetch_reference(TEACHER_COLLECTION, "name"))
            .await?;

        let (individual, group) =
            tokio::try_join!(self.fetch_individual(date), self.fetch_group(date))?;
        tracing::debug!(
            individual = individual.len(),
            group = group.len(),
            "fetched lessons"
        );

        let matrix = assemble_matrix(date, &teachers, &timeslots, individual, group);
        if !matrix.unassigned.is_empty() {
            tracing::debug!(count = matrix.unassigned.len(), "lessons without a matrix cell");
        }

        let columns = match self.columns.get() {
            Some(columns) => columns.clone(),
            None if timeslots.is_empty() => build_columns(&timeslots),
            None => self.columns.get_or_init(|| build_columns(&timeslots)).clone(),
        };

        let render = self.render(generation, columns, &matrix);
        tracing::debug!(%date, ?render, placed = matrix.assignment_count(), "schedule loaded");
        Ok(LoadOutcome { matrix, render })
    }

    fn render(
        &self,
        generation: u64,
        columns: ColumnSchema,
        matrix: &TeacherScheduleMatrix,
    ) -> RenderOutcome {
        if self.is_disposed() {
            return RenderOutcome::Disposed;
        }
        let mut slot = self.widget.lock().unwrap_or_else(|e| e.into_inner());
        if generation < slot.rendered_generation {
            tracing::debug!(generation, latest = slot.rendered_generation, "dropping stale load");
            return RenderOutcome::Stale;
        }
        slot.rendered_generation = generation;

        let data = GridData::from(matrix);
        if slot.widget.is_some() && slot.columns != columns {
            // Only happens once: a widget mounted before any timeslot existed.
            tracing::debug!(columns = columns.len(), "column schema changed, remounting widget");
            if let Some(mut stale) = slot.widget.take() {
                stale.destroy();
            }
        }
        match slot.widget.as_mut() {
            Some(widget) => {
                widget.update_config(data);
                widget.force_render();
                RenderOutcome::Updated
            }
            None => {
                slot.columns = columns.clone();
                slot.widget = Some(self.host.mount(GridConfig {
                    columns,
                    data,
                    search: SearchConfig::default(),
                }));
                RenderOutcome::Mounted
            }
        }
    }

    async fn debounced_load(&self) {
        if self.is_disposed() {
            return;
        }
        if let Err(e) = self.load_schedule().await {
            tracing::warn!("schedule reload failed: {e}");
            if !self.is_disposed() {
                let mut slot = self.widget.lock().unwrap_or_else(|e| e.into_inner());
                if let Some(widget) = slot.widget.as_mut() {
                    widget.notice(e.user_message());
                }
            }
        }
    }

    async fn fetch_reference<T: serde::de::DeserializeOwned>(
        &self,
        collection: &str,
        sort: &str,
    ) -> Result<Vec<T>> {
        let items = self
            .service
            .get_full_list(collection, &ListOptions::new().sort(sort))
            .await?;
        tracing::debug!(collection, count = items.len(), "fetched reference data");
        items
            .into_iter()
            .map(serde_json::from_value)
            .collect::<serde_json::Result<Vec<T>>>()
            .map_err(|e| ScheduleError::Decode(format!("{collection}: {e}")))
    }

    async fn fetch_day(
        &self,
        collection: &str,
        date: NaiveDate,
        expand: &str,
    ) -> Result<Vec<serde_json::Value>> {
        let options = ListOptions::new()
            .filter(filter::date_equals(date))
            .expand(expand);
        let page = self
            .service
            .get_list(collection, 1, self.page_size, &options)
            .await?;
        if page.total_items > i64::from(self.page_size) {
            tracing::warn!(
                collection,
                total = page.total_items,
                shown = page.items.len(),
                "more lessons than fit on one page"
            );
        }
        Ok(page.items)
    }

    async fn fetch_individual(&self, date: NaiveDate) -> Result<Vec<Assignment>> {
        let items = self.fetch_day(LESSON_COLLECTION, date, INDIVIDUAL_EXPAND).await?;
        records::individual_assignments(items)
            .map_err(|e| ScheduleError::Decode(format!("{LESSON_COLLECTION}: {e}")))
    }

    async fn fetch_group(&self, date: NaiveDate) -> Result<Vec<Assignment>> {
        let items = self
            .fetch_day(GROUP_LESSON_COLLECTION, date, GROUP_EXPAND)
            .await?;
        records::group_assignments(items)
            .map_err(|e| ScheduleError::Decode(format!("{GROUP_LESSON_COLLECTION}: {e}")))
    }

    /// Initial load plus realtime subscriptions on both lesson collections.
    ///
    /// A failed initial load is logged and left to the next reload; a failed
    /// subscription is returned.
    pub async fn mount(&self) -> Result<()> {
        tracing::info!(date = %self.selected_date(), "mounting schedule board");
        if let Err(e) = self.load_schedule().await {
            tracing::warn!("initial schedule load failed: {e}");
        }

        let mut subscriptions = self.subscriptions.lock().await;
        for collection in [LESSON_COLLECTION, GROUP_LESSON_COLLECTION] {
            let trigger = self.reload.handle();
            let handler = Arc::new(move |event: crate::backend::RecordEvent| {
                tracing::trace!(collection = %event.collection, action = %event.action, "record changed");
                trigger.trigger();
            });
            let id = self
                .service
                .subscribe(collection, ALL_RECORDS, handler)
                .await?;
            subscriptions.push((collection, id));
        }
        Ok(())
    }

    /// Releases the widget, removes subscriptions and stops the reload gate.
    /// Subscription removal is best-effort. Calling it again does nothing.
    pub async fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.reload.close();

        let widget = {
            let mut slot = self.widget.lock().unwrap_or_else(|e| e.into_inner());
            slot.widget.take()
        };
        if let Some(mut widget) = widget {
            widget.destroy();
        }

        let subscriptions = std::mem::take(&mut *self.subscriptions.lock().await);
        for (collection, id) in subscriptions {
            if let Err(e) = self.service.unsubscribe(collection, ALL_RECORDS, id).await {
                tracing::warn!(collection, "could not remove subscription: {e}");
            }
        }
        tracing::info!("schedule board disposed");
    }
}
