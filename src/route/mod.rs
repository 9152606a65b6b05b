use std::collections::BTreeMap;

use rocket::{Build, Rocket, Route};

pub mod auth;
pub mod batch;
pub mod dashboard;
pub mod result;
pub mod shift;
pub mod students;
pub mod test;

use auth::*;
use batch::*;
use dashboard::*;
use result::*;
use shift::*;
use students::*;
use test::*;

use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    data::{
        admin::AdminSummary,
        auth::AuthenticatedUser,
        batch as bd,
        batch::db::{BatchCreateData, BatchPage, BatchUpdateData, Pagination},
        result as rd,
        result::db::ResultSubmitData,
        shift as sd,
        shift::db::ShiftCreateData,
        student as st,
        student::db::StudentPage,
        test as td,
        test::db::TestCreateData,
    },
    resp::{jwt::doc::JWTAuth, problem::Problem},
    role::Role,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        login,
        me,
        logout,
        students_list,
        students_stats,
        student_get,
        student_approve,
        student_block,
        student_unblock,
        students_bulk_approve,
        students_bulk_block,
        student_replace_batches,
        student_replace_tests,
        student_replace_shifts,
        student_assign_shift,
        student_delete,
        my_batches,
        my_tests,
        my_batch_tests,
        batch_create,
        batch_list,
        batch_list_mine,
        batch_get,
        batch_update,
        batch_delete,
        batch_assign_students,
        batch_remove_students,
        batch_assign_tests,
        batch_remove_tests,
        test_create,
        test_list,
        test_get,
        test_attach_text,
        test_set_active,
        test_delete,
        shift_create,
        shift_list,
        shift_get,
        shift_delete,
        result_submit,
        shift_results,
        my_results,
        dashboard_stats
    ),
    components(schemas(
        Role,
        AuthenticatedUser,
        AdminSummary,
        LoginData,
        LoginResponse,
        st::Student,
        st::StudentSummary,
        st::StudentView,
        st::StudentStats,
        StudentPage,
        StudentIdsData,
        BatchIdsData,
        TestIdsData,
        ShiftIdsData,
        AssignShiftData,
        BulkUpdateResponse,
        bd::Batch,
        bd::BatchSummary,
        bd::BatchView,
        BatchPage,
        Pagination,
        BatchCreateData,
        BatchUpdateData,
        td::Test,
        td::TestSummary,
        TestCreateData,
        ReferenceTextData,
        TestActiveData,
        sd::Shift,
        sd::ShiftSummary,
        ShiftCreateData,
        rd::TestResult,
        rd::Mistake,
        ResultSubmitData,
        DashboardStats,
        ShiftOccupancy,
        TestPerformance,
        Problem
    )),
    modifiers(&JWTAuth, &V1_PREFIX)
)]
pub struct ApiDocV1;

pub struct PathPrefix(pub &'static str);
static V1_PREFIX: PathPrefix = PathPrefix("/api/v1");

impl utoipa::Modify for PathPrefix {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let mut new_paths = BTreeMap::new();

        for (path, item) in std::mem::take(&mut openapi.paths.paths) {
            new_paths.insert(self.0.to_string() + path.as_ref(), item);
        }

        openapi.paths.paths = new_paths;
    }
}

pub fn api_v1() -> Vec<Route> {
    routes![
        login,
        me,
        logout,
        students_list,
        students_stats,
        student_get,
        student_approve,
        student_block,
        student_unblock,
        students_bulk_approve,
        students_bulk_block,
        student_replace_batches,
        student_replace_tests,
        student_replace_shifts,
        student_assign_shift,
        student_delete,
        my_batches,
        my_tests,
        my_batch_tests,
        batch_create,
        batch_list,
        batch_list_mine,
        batch_get,
        batch_update,
        batch_delete,
        batch_assign_students,
        batch_remove_students,
        batch_assign_tests,
        batch_remove_tests,
        test_create,
        test_list,
        test_get,
        test_attach_text,
        test_set_active,
        test_delete,
        shift_create,
        shift_list,
        shift_get,
        shift_delete,
        result_submit,
        shift_results,
        my_results,
        dashboard_stats
    ]
}

pub fn mount_api(rocket: Rocket<Build>) -> Rocket<Build> {
    rocket.mount("/api/v1", api_v1()).mount(
        "/",
        SwaggerUi::new("/swagger/<_..>").url("/api/v1/openapi.json", ApiDocV1::openapi()),
    )
}
