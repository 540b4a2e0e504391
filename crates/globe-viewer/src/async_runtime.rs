//! Async runtime used to drive flight sequences off the main schedule.
//!
//! Provides a `TaskSpawner` `SystemParam` that hides platform differences:
//! - Native: Uses `bevy_tokio_tasks` for a Tokio runtime
//! - WASM: Uses Bevy's built-in `AsyncComputeTaskPool`
//!
//! Flight futures only await completion signals from the render loop, so
//! either executor works.

use bevy::prelude::*;

/// Plugin that sets up the async runtime for the current platform.
pub struct AsyncRuntimePlugin;

impl Plugin for AsyncRuntimePlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<RunningTasks>();

        #[cfg(not(target_family = "wasm"))]
        app.add_plugins(bevy_tokio_tasks::TokioTasksPlugin::default());

        app.add_systems(Last, prune_finished_tasks);
    }
}

/// Handles of every task spawned for the current viewer, so teardown can
/// cancel them.
#[derive(Resource, Default)]
pub struct RunningTasks {
    tasks: Vec<SpawnedTask>,
}

impl RunningTasks {
    pub fn push(&mut self, task: SpawnedTask) {
        self.tasks.push(task);
    }

    /// Cancel every task still running.
    pub fn cancel_all(&mut self) {
        let count = self.tasks.len();
        for task in self.tasks.drain(..) {
            task.cancel();
        }
        if count > 0 {
            tracing::debug!("Cancelled {count} running task(s)");
        }
    }
}

fn prune_finished_tasks(mut running: ResMut<RunningTasks>) {
    if running.tasks.iter().any(SpawnedTask::is_finished) {
        running.tasks.retain(|task| !task.is_finished());
    }
}

// Native implementation using Tokio.
#[cfg(not(target_family = "wasm"))]
mod native {
    use std::future::Future;

    use bevy::{ecs::system::SystemParam, prelude::*};

    /// Handle to a spawned task that can be cancelled.
    pub struct SpawnedTask(tokio::task::JoinHandle<()>);

    impl SpawnedTask {
        /// Abort the task. Dropping its future also drops any flight
        /// completion it was waiting on.
        pub fn cancel(self) {
            self.0.abort();
        }

        pub fn is_finished(&self) -> bool {
            self.0.is_finished()
        }
    }

    /// A system parameter for spawning async tasks in a platform-agnostic way.
    #[derive(SystemParam)]
    pub struct TaskSpawner<'w, 's> {
        runtime: Res<'w, bevy_tokio_tasks::TokioTasksRuntime>,
        // Add Local<()> to match the WASM signature.
        #[allow(dead_code)]
        _local: Local<'s, ()>,
    }

    impl TaskSpawner<'_, '_> {
        /// Spawn a task and return a handle that can cancel it.
        pub fn spawn<F>(&self, future: F) -> SpawnedTask
        where
            F: Future<Output = ()> + Send + 'static,
        {
            SpawnedTask(self.runtime.spawn_background_task(move |_ctx| future))
        }
    }
}

// WASM implementation using Bevy's task pool.
#[cfg(target_family = "wasm")]
mod wasm {
    use std::future::Future;

    use bevy::{ecs::system::SystemParam, prelude::*, tasks::AsyncComputeTaskPool};

    /// Handle to a spawned task that can be cancelled.
    pub struct SpawnedTask(bevy::tasks::Task<()>);

    impl SpawnedTask {
        /// Drop the task so it is no longer polled.
        pub fn cancel(self) {
            drop(self.0);
        }

        pub fn is_finished(&self) -> bool {
            self.0.is_finished()
        }
    }

    /// A system parameter for spawning async tasks in a platform-agnostic way.
    ///
    /// On WASM, this uses a `Local<()>` placeholder since no runtime resource is needed.
    #[derive(SystemParam)]
    pub struct TaskSpawner<'w, 's> {
        #[allow(dead_code)]
        _local: Local<'s, ()>,
        #[allow(dead_code)]
        _marker: std::marker::PhantomData<&'w ()>,
    }

    impl TaskSpawner<'_, '_> {
        /// Spawn a task and return a handle that can cancel it.
        ///
        /// On WASM, the `Send` bound is not required since the browser is single-threaded.
        pub fn spawn<F>(&self, future: F) -> SpawnedTask
        where
            F: Future<Output = ()> + 'static,
        {
            SpawnedTask(AsyncComputeTaskPool::get().spawn_local(future))
        }
    }
}

#[cfg(not(target_family = "wasm"))]
pub use native::{SpawnedTask, TaskSpawner};
#[cfg(target_family = "wasm")]
pub use wasm::{SpawnedTask, TaskSpawner};
