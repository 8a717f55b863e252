//! Built-in service catalog
//!
//! The services offered on the document-intake page. Several services share
//! contact and identity fields; consolidation keeps the first occurrence.

use lazy_static::lazy_static;

use crate::schema::{FieldDescriptor, SchemaRegistry, Service};

/// Maximum characters accepted by free-text notes
pub const NOTES_MAX_LENGTH: usize = 500;

lazy_static! {
    /// Catalog used by the site and the CLI
    pub static ref CATALOG: SchemaRegistry = SchemaRegistry::new(builtin_services());
}

fn contact_fields() -> Vec<FieldDescriptor> {
    vec![
        FieldDescriptor::text("contact-name", "联系人姓名").required(),
        FieldDescriptor::text("contact-phone", "联系电话").required(),
        FieldDescriptor::text("contact-email", "电子邮箱"),
    ]
}

fn health_assessment() -> Service {
    let mut fields = contact_fields();
    fields.extend([
        FieldDescriptor::radio(
            "gender",
            "性别",
            &[("male", "男"), ("female", "女")],
        ),
        FieldDescriptor::text("age", "年龄"),
        FieldDescriptor::checkbox_group(
            "conditions",
            "既往病史",
            &[
                ("hypertension", "高血压"),
                ("diabetes", "糖尿病"),
                ("heart", "心脏疾病"),
                ("none", "无"),
            ],
        ),
        FieldDescriptor::file("medical-reports", "体检报告"),
        FieldDescriptor::textarea("remarks", "补充说明").with_max_length(NOTES_MAX_LENGTH),
    ]);
    Service::new("health-assessment", "健康评估", fields)
}

fn company_registration() -> Service {
    let mut fields = contact_fields();
    fields.extend([
        FieldDescriptor::text("company-name", "拟注册公司名称").required(),
        FieldDescriptor::select(
            "jurisdiction",
            "注册地",
            &[
                ("hk", "中国香港"),
                ("sg", "新加坡"),
                ("us-de", "美国特拉华州"),
                ("bvi", "英属维尔京群岛"),
            ],
        )
        .required(),
        FieldDescriptor::person_group(
            "shareholders",
            "股东信息",
            vec![
                FieldDescriptor::text("name", "股东姓名"),
                FieldDescriptor::text("nationality", "国籍"),
                FieldDescriptor::text("share", "持股比例"),
            ],
        )
        .with_max(5),
        FieldDescriptor::file("id-documents", "身份证明文件"),
        FieldDescriptor::textarea("remarks", "备注").with_max_length(NOTES_MAX_LENGTH),
    ]);
    Service::new("company-registration", "公司注册", fields)
}

fn tax_planning() -> Service {
    let mut fields = contact_fields();
    fields.extend([
        FieldDescriptor::radio(
            "tax-residency",
            "税务居民身份",
            &[("cn", "中国税务居民"), ("non-cn", "非中国税务居民")],
        )
        .required(),
        FieldDescriptor::table(
            "income-sources",
            "收入来源",
            &[
                ("source", "收入类型"),
                ("country", "来源国家/地区"),
                ("amount", "年收入金额"),
            ],
        )
        .with_max(10),
        FieldDescriptor::file("tax-returns", "近三年纳税申报表"),
        FieldDescriptor::textarea("remarks", "其他需求").with_max_length(NOTES_MAX_LENGTH),
    ]);
    Service::new("tax-planning", "税务筹划", fields)
}

fn immigration() -> Service {
    let mut fields = contact_fields();
    fields.extend([
        FieldDescriptor::select(
            "destination",
            "目标国家/地区",
            &[
                ("hk", "中国香港"),
                ("sg", "新加坡"),
                ("jp", "日本"),
                ("ca", "加拿大"),
            ],
        )
        .required(),
        FieldDescriptor::person_group(
            "family-members",
            "随行家属",
            vec![
                FieldDescriptor::text("name", "姓名"),
                FieldDescriptor::text("relation", "与申请人关系"),
                FieldDescriptor::text("birth-date", "出生日期"),
            ],
        )
        .with_max(6),
        FieldDescriptor::table(
            "education",
            "教育背景",
            &[
                ("school", "学校"),
                ("degree", "学位"),
                ("year", "毕业年份"),
            ],
        )
        .with_max(5),
        FieldDescriptor::file("id-documents", "护照及身份证明"),
        FieldDescriptor::textarea("remarks", "补充说明").with_max_length(NOTES_MAX_LENGTH),
    ]);
    Service::new("immigration", "移民咨询", fields)
}

/// Services in the order they are listed on the intake page
pub fn builtin_services() -> Vec<Service> {
    vec![
        health_assessment(),
        company_registration(),
        tax_planning(),
        immigration(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn service_ids_are_unique() {
        let ids: HashSet<_> = CATALOG.services().iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids.len(), CATALOG.services().len());
    }

    #[test]
    fn field_ids_are_unique_within_a_service() {
        for service in CATALOG.services() {
            let ids: HashSet<_> = service.fields.iter().map(|f| f.id.as_str()).collect();
            assert_eq!(ids.len(), service.fields.len(), "duplicate field in {}", service.id);
        }
    }

    #[test]
    fn shared_fields_resolve_to_first_service() {
        let fields = CATALOG.fields_for(&["tax-planning", "company-registration"]);
        let remarks: Vec<_> = fields.iter().filter(|f| f.id == "remarks").collect();
        assert_eq!(remarks.len(), 1);
        assert_eq!(remarks[0].label, "其他需求");
    }

    #[test]
    fn repeated_fields_declare_a_cap() {
        for field in CATALOG.services().iter().flat_map(|s| s.fields.iter()) {
            if field.kind.is_repeated() {
                assert!(field.max.is_some(), "{} has no entry cap", field.id);
                assert!(!field.row_keys().is_empty());
            }
        }
    }
}
