//! Upload and delete rules. View access is answered by the repository
//! (`has_task_access` / `has_attachment_access`).

use filedock_core::attachment::Attachment;
use filedock_core::project::Project;
use filedock_core::task::Task;

/// Assignee, creator, or anyone else: every authenticated user may upload.
pub fn can_upload(_user_id: &str, _task: &Task) -> bool {
    true
}

/// The uploader, the task's assignee, or the project's owner may delete.
pub fn can_delete(user_id: &str, attachment: &Attachment, task: &Task, project: &Project) -> bool {
    attachment.uploaded_by == user_id
        || task.assignee_id.as_deref() == Some(user_id)
        || project.owner_id == user_id
}
