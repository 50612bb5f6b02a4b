use crate::{
    launch_plan::LaunchPlanner, logging::DesktopLogCategory, process_launcher::ProcessObservers,
    ProcessRole, SupervisorError, SupervisorState,
};

impl SupervisorState {
    /// Plans, launches and records the process for `role`. Nothing is spawned
    /// when a handle for the role is already tracked or shutdown has begun.
    pub(crate) fn launch_role(
        &self,
        role: ProcessRole,
        observers: ProcessObservers,
    ) -> Result<Option<u32>, SupervisorError> {
        if self.exit_state().is_quitting() {
            return Err(SupervisorError::Cancelled);
        }

        let planner = LaunchPlanner::new(&self.config, self.platform);
        let spec = planner.resolve_launch_spec(self.mode, role, |message| {
            self.log(DesktopLogCategory::Startup, message)
        });

        // Checked again under the slot lock: a shutdown that ran while the
        // launch was being planned must not be followed by a fresh handle.
        let pid = self.slot(role).fill_with(|| {
            if self.exit_state().is_quitting() {
                return Err(SupervisorError::Cancelled);
            }
            self.log(
                DesktopLogCategory::Startup,
                &format!(
                    "launching {role} process ({:?} mode): {:?}",
                    spec.mode,
                    spec.debug_command()
                ),
            );
            self.launcher.launch(&spec, observers)
        })?;

        self.log(
            DesktopLogCategory::Startup,
            &format!(
                "{role} process started with pid {}",
                pid.map(|pid| pid.to_string())
                    .unwrap_or_else(|| "unknown".to_string())
            ),
        );
        Ok(pid)
    }
}
