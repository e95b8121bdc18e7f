//! Simulation events.

// VM EVENTS ///////////////////////////////////////////////////////////////////////////////////////

pub mod vm {
    use serde::Serialize;

    use crate::core::allocation_policy::AllocationError;

    #[derive(Serialize)]
    pub struct VmSubmitted {
        pub vm_id: u32,
    }

    #[derive(Serialize)]
    pub struct VmCreateRequest {
        pub vm_id: u32,
    }

    #[derive(Serialize)]
    pub struct VmCreated {
        pub vm_id: u32,
        pub host_id: u32,
    }

    #[derive(Serialize)]
    pub struct VmCreationFailed {
        pub vm_id: u32,
        pub error: AllocationError,
    }

    #[derive(Serialize)]
    pub struct VmDestroyRequest {
        pub vm_id: u32,
    }
}

// TASK EVENTS /////////////////////////////////////////////////////////////////////////////////////

pub mod task {
    use serde::Serialize;

    #[derive(Serialize)]
    pub struct TaskArrived {
        pub task_id: u32,
    }

    #[derive(Serialize)]
    pub struct TaskSubmitRequest {
        pub task_id: u32,
    }

    #[derive(Serialize)]
    pub struct TaskReturned {
        pub task_id: u32,
    }

    #[derive(Serialize)]
    pub struct DispatchWaitingTasks {}
}

// DATACENTER EVENTS ///////////////////////////////////////////////////////////////////////////////

pub mod datacenter {
    use serde::Serialize;

    #[derive(Serialize)]
    pub struct UpdateTaskProcessing {}
}
