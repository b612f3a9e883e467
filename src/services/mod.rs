pub mod attendance_workflow;
