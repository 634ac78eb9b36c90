//! Numeric error tables for the two vendor error families.
//!
//! Each table is a fixed `(code, name)` list in ascending code order. Codes
//! and names are unique within a family, so the mapping is reversible.

/// Mobile equipment errors reported as `+CME ERROR: <code>`.
pub(crate) const CME_ERRORS: &[(u16, &str)] = &[
    (0, "PHONE_FAILURE"),
    (1, "NO_CONNECTION_TO_PHONE"),
    (2, "PHONE_ADAPTER_LINK_RESERVED"),
    (3, "OPERATION_NOT_ALLOWED"),
    (4, "OPERATION_NOT_SUPPORTED"),
    (5, "PH_SIM_PIN_REQUIRED"),
    (6, "PH_FSIM_PIN_REQUIRED"),
    (7, "PH_FSIM_PUK_REQUIRED"),
    (10, "SIM_NOT_INSERTED"),
    (11, "SIM_PIN_REQUIRED"),
    (12, "SIM_PUK_REQUIRED"),
    (13, "SIM_FAILURE"),
    (14, "SIM_BUSY"),
    (15, "SIM_WRONG"),
    (16, "INCORRECT_PASSWORD"),
    (17, "SIM_PIN2_REQUIRED"),
    (18, "SIM_PUK2_REQUIRED"),
    (20, "MEMORY_FULL"),
    (21, "INVALID_INDEX"),
    (22, "NOT_FOUND"),
    (23, "MEMORY_FAILURE"),
    (24, "TEXT_STRING_TOO_LONG"),
    (25, "INVALID_CHARACTERS_IN_TEXT_STRING"),
    (26, "DIAL_STRING_TOO_LONG"),
    (27, "INVALID_CHARACTERS_IN_DIAL_STRING"),
    (30, "NO_NETWORK_SERVICE"),
    (31, "NETWORK_TIMEOUT"),
    (32, "NETWORK_NOT_ALLOWED_EMERGENCY_CALLS_ONLY"),
    (40, "NETWORK_PERSONALIZATION_PIN_REQUIRED"),
    (41, "NETWORK_PERSONALIZATION_PUK_REQUIRED"),
    (42, "NETWORK_SUBSET_PERSONALIZATION_PIN_REQUIRED"),
    (43, "NETWORK_SUBSET_PERSONALIZATION_PUK_REQUIRED"),
    (44, "SERVICE_PROVIDER_PERSONALIZATION_PIN_REQUIRED"),
    (45, "SERVICE_PROVIDER_PERSONALIZATION_PUK_REQUIRED"),
    (46, "CORPORATE_PERSONALIZATION_PIN_REQUIRED"),
    (47, "CORPORATE_PERSONALIZATION_PUK_REQUIRED"),
    (48, "PH_SIM_PUK_REQUIRED"),
    (50, "INCORRECT_PARAMETERS"),
    (100, "UNKNOWN_ERROR"),
    (103, "ILLEGAL_MS"),
    (106, "ILLEGAL_ME"),
    (107, "GPRS_SERVICES_NOT_ALLOWED"),
    (111, "PLMN_NOT_ALLOWED"),
    (112, "LOCATION_AREA_NOT_ALLOWED"),
    (113, "ROAMING_NOT_ALLOWED_IN_THIS_LOCATION_AREA"),
    (126, "OPERATION_TEMPORARY_NOT_ALLOWED"),
    (132, "SERVICE_OPERATION_NOT_SUPPORTED"),
    (133, "REQUESTED_SERVICE_OPTION_NOT_SUBSCRIBED"),
    (134, "SERVICE_OPTION_TEMPORARY_OUT_OF_ORDER"),
    (148, "UNSPECIFIED_GPRS_ERROR"),
    (149, "PDP_AUTHENTICATION_FAILURE"),
    (150, "INVALID_MOBILE_CLASS"),
    (256, "OPERATION_TEMPORARILY_NOT_ALLOWED"),
    (257, "CALL_BARRED"),
    (258, "PHONE_IS_BUSY"),
    (259, "USER_ABORT"),
    (260, "INVALID_DIAL_STRING"),
    (261, "SS_NOT_EXECUTED"),
    (262, "SIM_BLOCKED"),
    (263, "INVALID_BLOCK"),
    (772, "SIM_POWERED_DOWN"),
];

/// Message service errors reported as `+CMS ERROR: <code>`.
pub(crate) const CMS_ERRORS: &[(u16, &str)] = &[
    (1, "UNASSIGNED_NUMBER"),
    (8, "OPERATOR_DETERMINED_BARRING"),
    (10, "CALL_BARED"),
    (21, "SHORT_MESSAGE_TRANSFER_REJECTED"),
    (27, "DESTINATION_OUT_OF_SERVICE"),
    (28, "UNINDENTIFIED_SUBSCRIBER"),
    (29, "FACILITY_REJECTED"),
    (30, "UNKNOWN_SUBSCRIBER"),
    (38, "NETWORK_OUT_OF_ORDER"),
    (41, "TEMPORARY_FAILURE"),
    (42, "CONGESTION"),
    (47, "RECOURCES_UNAVAILABLE"),
    (50, "REQUESTED_FACILITY_NOT_SUBSCRIBED"),
    (69, "REQUESTED_FACILITY_NOT_IMPLEMENTED"),
    (81, "INVALID_SHORT_MESSAGE_TRANSFER_REFERENCE_VALUE"),
    (95, "INVALID_MESSAGE_UNSPECIFIED"),
    (96, "INVALID_MANDATORY_INFORMATION"),
    (97, "MESSAGE_TYPE_NON_EXISTENT_OR_NOT_IMPLEMENTED"),
    (98, "MESSAGE_NOT_COMPATIBLE_WITH_SHORT_MESSAGE_PROTOCOL"),
    (99, "INFORMATION_ELEMENT_NON_EXISTENT_OR_NOT_IMPLEMENTE"),
    (111, "PROTOCOL_ERROR_UNSPECIFIED"),
    (127, "INTERNETWORKING_UNSPECIFIED"),
    (128, "TELEMATIC_INTERNETWORKING_NOT_SUPPORTED"),
    (129, "SHORT_MESSAGE_TYPE_0_NOT_SUPPORTED"),
    (130, "CANNOT_REPLACE_SHORT_MESSAGE"),
    (143, "UNSPECIFIED_TP_PID_ERROR"),
    (144, "DATA_CODE_SCHEME_NOT_SUPPORTED"),
    (145, "MESSAGE_CLASS_NOT_SUPPORTED"),
    (159, "UNSPECIFIED_TP_DCS_ERROR"),
    (160, "COMMAND_CANNOT_BE_ACTIONED"),
    (161, "COMMAND_UNSUPPORTED"),
    (175, "UNSPECIFIED_TP_COMMAND_ERROR"),
    (176, "TPDU_NOT_SUPPORTED"),
    (192, "SC_BUSY"),
    (193, "NO_SC_SUBSCRIPTION"),
    (194, "SC_SYSTEM_FAILURE"),
    (195, "INVALID_SME_ADDRESS"),
    (196, "DESTINATION_SME_BARRED"),
    (197, "SM_REJECTED_DUPLICATE_SM"),
    (198, "TP_VPF_NOT_SUPPORTED"),
    (199, "TP_VP_NOT_SUPPORTED"),
    (208, "D0_SIM_SMS_STORAGE_FULL"),
    (209, "NO_SMS_STORAGE_CAPABILITY_IN_SIM"),
    (210, "ERROR_IN_MS"),
    (211, "MEMORY_CAPACITY_EXCEEDED"),
    (212, "SIM_APPLICATION_TOOLKIT_BUSY"),
    (213, "SIM_DATA_DOWNLOAD_ERROR"),
    (255, "UNSPECIFIED_ERROR_CAUSE"),
    (300, "ME_FAILURE"),
    (301, "SMS_SERVICE_OF_ME_RESERVED"),
    (302, "OPERATION_NOT_ALLOWED"),
    (303, "OPERATION_NOT_SUPPORTED"),
    (304, "INVALID_PDU_MODE_PARAMETER"),
    (305, "INVALID_TEXT_MODE_PARAMETER"),
    (310, "SIM_NOT_INSERTED"),
    (311, "SIM_PIN_REQUIRED"),
    (312, "PH_SIM_PIN_REQUIRED"),
    (313, "SIM_FAILURE"),
    (314, "SIM_BUSY"),
    (315, "SIM_WRONG"),
    (316, "SIM_PUK_REQUIRED"),
    (317, "SIM_PIN2_REQUIRED"),
    (318, "SIM_PUK2_REQUIRED"),
    (320, "MEMORY_FAILURE"),
    (321, "INVALID_MEMORY_INDEX"),
    (322, "MEMORY_FULL"),
    (330, "SMSC_ADDRESS_UNKNOWN"),
    (331, "NO_NETWORK_SERVICE"),
    (332, "NETWORK_TIMEOUT"),
    (340, "NO_CNMA_EXPECTED"),
    (500, "UNKNOWN_ERROR"),
    (512, "USER_ABORT"),
    (513, "UNABLE_TO_STORE"),
    (514, "INVALID_STATUS"),
    (515, "DEVICE_BUSY_OR_INVALID_CHARACTER_IN_STRING"),
    (516, "INVALID_LENGTH"),
    (517, "INVALID_CHARACTER_IN_PDU"),
    (518, "INVALID_PARAMETER"),
    (519, "INVALID_LENGTH_OR_CHARACTER"),
    (520, "INVALID_CHARACTER_IN_TEXT"),
    (521, "TIMER_EXPIRED"),
    (522, "OPERATION_TEMPORARY_NOT_ALLOWED"),
    (532, "SIM_NOT_READY"),
    (534, "CELL_BROADCAST_ERROR_UNKNOWN"),
    (535, "PROTOCOL_STACK_BUSY"),
    (538, "INVALID_PARAMETER2"),
];
